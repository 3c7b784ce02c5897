//! # Static Heap Storage

/// Total size of the statically reserved kernel heap.
///
/// The heap does not grow; its capacity is fixed at build time.
pub const KERNEL_HEAP_SIZE: usize = 4 * 1024 * 1024; // 4 MiB

/// Heap storage with a minimum alignment suitable for block headers.
///
/// Intended to be placed in a `static` by the kernel image and handed to
/// [`Heap::new`](crate::Heap::new) or [`SharedHeap::new`](crate::SharedHeap::new)
/// by mutable reference.
#[repr(C, align(16))]
pub struct HeapMem<const N: usize = KERNEL_HEAP_SIZE>([u8; N]);

impl<const N: usize> HeapMem<N> {
    /// Zero-filled storage.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Default for HeapMem<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AsRef<[u8]> for HeapMem<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> AsMut<[u8]> for HeapMem<N> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
