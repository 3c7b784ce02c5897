//! # Shared Heap Handle and Scoped Buffers
//!
//! The kernel core is single-threaded and non-reentrant, so the heap needs
//! interior mutability but no lock. [`SharedHeap`] wraps a [`Heap`] in a
//! [`RefCell`] and exposes it through [`with_heap`](SharedHeap::with_heap),
//! the same closure shape the spinlock-guarded allocator uses.
//!
//! [`HeapBuffer`] is a scoped allocation: it is freed when dropped, which
//! makes "release on every exit path" hold for `?`-propagated errors too.

use crate::free_list::{ArenaStorage, Heap};
use crate::{Allocation, HeapError, HeapStats};
use core::cell::RefCell;
use log::error;

/// A heap that can be shared by reference between the subsystems using it.
pub struct SharedHeap<S> {
    inner: RefCell<Heap<S>>,
}

impl<S> SharedHeap<S> {
    /// Wrap `storage` in a (not yet initialized) shared heap.
    pub const fn new(storage: S) -> Self {
        Self {
            inner: RefCell::new(Heap::new(storage)),
        }
    }

    /// Unwrap the heap.
    pub fn into_inner(self) -> Heap<S> {
        self.inner.into_inner()
    }
}

impl<S: ArenaStorage> SharedHeap<S> {
    /// Execute `f` with exclusive access to the heap.
    ///
    /// # Errors
    /// [`HeapError::Reentrant`] if called from within another `with_heap`.
    pub fn with_heap<R>(&self, f: impl FnOnce(&mut Heap<S>) -> R) -> Result<R, HeapError> {
        let mut heap = self
            .inner
            .try_borrow_mut()
            .map_err(|_| HeapError::Reentrant)?;
        Ok(f(&mut heap))
    }

    /// See [`Heap::init`].
    ///
    /// # Errors
    /// As [`Heap::init`].
    pub fn init(&self) -> Result<(), HeapError> {
        self.with_heap(Heap::init)?
    }

    /// See [`Heap::stats`].
    ///
    /// # Errors
    /// As [`Heap::stats`].
    pub fn stats(&self) -> Result<HeapStats, HeapError> {
        self.with_heap(|heap| heap.stats())?
    }

    /// Allocate a scoped buffer of `size` bytes.
    ///
    /// # Errors
    /// As [`Heap::allocate`].
    pub fn buffer(&self, size: usize) -> Result<HeapBuffer<'_, S>, HeapError> {
        HeapBuffer::allocate(self, size)
    }

    /// Allocate a zero-filled scoped buffer of `size` bytes.
    ///
    /// # Errors
    /// As [`Heap::zero_allocate`].
    pub fn zeroed_buffer(&self, size: usize) -> Result<HeapBuffer<'_, S>, HeapError> {
        HeapBuffer::zeroed(self, size)
    }
}

/// An allocation that returns itself to its heap when dropped.
pub struct HeapBuffer<'h, S: ArenaStorage> {
    heap: &'h SharedHeap<S>,
    allocation: Allocation,
}

impl<'h, S: ArenaStorage> HeapBuffer<'h, S> {
    /// Allocate `size` bytes from `heap`.
    ///
    /// # Errors
    /// As [`Heap::allocate`].
    pub fn allocate(heap: &'h SharedHeap<S>, size: usize) -> Result<Self, HeapError> {
        let allocation = heap.with_heap(|h| h.allocate(size))??;
        Ok(Self { heap, allocation })
    }

    /// Allocate `size` zeroed bytes from `heap`.
    ///
    /// # Errors
    /// As [`Heap::zero_allocate`].
    pub fn zeroed(heap: &'h SharedHeap<S>, size: usize) -> Result<Self, HeapError> {
        let allocation = heap.with_heap(|h| h.zero_allocate(size))??;
        Ok(Self { heap, allocation })
    }

    /// Requested length of the buffer in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocation.len()
    }

    /// Always `false`; zero-sized buffers cannot be allocated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocation.is_empty()
    }

    /// The underlying heap handle.
    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        self.allocation
    }

    /// Run `f` over the buffer contents.
    ///
    /// `f` must not touch the heap itself.
    ///
    /// # Errors
    /// [`HeapError::Reentrant`] on nested heap access, or a validation error
    /// if the block was damaged behind the buffer's back.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, HeapError> {
        let allocation = self.allocation;
        self.heap.with_heap(|heap| heap.bytes(allocation).map(f))?
    }

    /// Run `f` over the mutable buffer contents.
    ///
    /// # Errors
    /// As [`with`](Self::with).
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, HeapError> {
        let allocation = self.allocation;
        self.heap.with_heap(|heap| heap.bytes_mut(allocation).map(f))?
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the buffer.
    ///
    /// # Errors
    /// [`HeapError::InvalidArgument`] if the range exceeds the buffer.
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<(), HeapError> {
        self.with(|bytes| {
            let src = offset
                .checked_add(dst.len())
                .and_then(|end| bytes.get(offset..end))
                .ok_or(HeapError::InvalidArgument)?;
            dst.copy_from_slice(src);
            Ok(())
        })?
    }
}

impl<S: ArenaStorage> Drop for HeapBuffer<'_, S> {
    fn drop(&mut self) {
        // `Heap::free` logs its own failures
        let allocation = self.allocation;
        if let Err(e) = self.heap.with_heap(|heap| heap.free(allocation)) {
            error!(
                "Leaking heap buffer at offset {:#x}: {e}",
                allocation.offset()
            );
        }
    }
}
