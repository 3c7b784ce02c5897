//! # Kernel Heap Arena
//!
//! This crate provides the kernel heap: a single fixed-size arena carved into
//! variably sized blocks, with first-fit allocation, tail splitting, merging
//! of the right-hand neighbour on free, and validation of every block header
//! it touches. It is the allocator every other core subsystem (notably the
//! filesystem reader) draws its transient buffers from.
//!
//! ## Arena Layout
//!
//! ```text
//! offset 0                                                        capacity
//! ┌────────┬──────────────┬────────┬──────────┬────────┬───────────────┐
//! │ header │ payload      │ header │ payload  │ header │ payload       │
//! │ used   │              │ free   │          │ used   │               │
//! └────────┴──────────────┴────────┴──────────┴────────┴───────────────┘
//!  ◄──────── size ───────► ◄───── size ──────► ◄──────── size ────────►
//! ```
//!
//! * Every block starts with a 16-byte [`BlockHeader`] recording its total
//!   `size`, a magic tag and a `used` flag.
//! * Blocks are contiguous. The next block starts `size` bytes after the
//!   current one, so the list of blocks is implicit and walked from offset 0.
//! * Payloads are 16-byte aligned relative to the arena base; requests are
//!   rounded up to 16 bytes.
//!
//! ## Core Components
//!
//! ### Heap ([`Heap`])
//!
//! The allocator proper. It owns its storage (any `AsRef<[u8]> + AsMut<[u8]>`)
//! and hands out [`Allocation`] handles instead of raw addresses. Payload
//! bytes are reached through [`Heap::bytes`] and [`Heap::bytes_mut`], which
//! re-validate the handle on every access.
//!
//! Error reporting favours availability: a corrupted header, a pointer
//! outside the arena or a double free is logged and returned as a
//! [`HeapError`], and the offending call changes nothing.
//!
//! ### Shared heap and scoped buffers ([`SharedHeap`], [`HeapBuffer`])
//!
//! Subsystems hold `&SharedHeap` and obtain [`HeapBuffer`]s, which free
//! themselves on drop. A failing filesystem operation therefore never leaks
//! a scratch buffer, whichever `?` it leaves through.
//!
//! ### Static storage ([`HeapMem`])
//!
//! A 16-byte aligned byte array sized [`KERNEL_HEAP_SIZE`] by default, meant
//! to back the kernel's single heap instance.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{Heap, HeapMem};
//!
//! let mut mem = Box::new(HeapMem::<4096>::new());
//! let mut heap = Heap::new(&mut *mem);
//! heap.init().unwrap();
//!
//! let a = heap.allocate(100).unwrap();
//! heap.bytes_mut(a).unwrap()[0] = 0xAA;
//! heap.free(a).unwrap();
//!
//! let stats = heap.stats().unwrap();
//! assert_eq!(stats.used, 0);
//! assert_eq!(stats.total, 4096);
//! ```
//!
//! ## Performance Characteristics
//!
//! * **Allocation**: O(n) in the number of blocks (first fit from the base)
//! * **Free**: O(1) plus validation; only the right neighbour is merged
//! * **Memory Overhead**: 16 bytes per block plus rounding to 16 bytes

#![cfg_attr(not(any(test, doctest)), no_std)]

mod free_list;
mod header;
mod shared;
mod static_heap;

pub use free_list::{ALIGN, ArenaStorage, BlockInfo, Blocks, Heap, MIN_BLOCK_SIZE};
pub use header::{ALLOC_MAGIC, BlockHeader, HEADER_SIZE};
pub use shared::{HeapBuffer, SharedHeap};
pub use static_heap::{HeapMem, KERNEL_HEAP_SIZE};

/// Opaque handle to a live allocation.
///
/// The handle records the payload offset from the arena base and the
/// requested length. It is `Copy` like the pointer it replaces; the heap
/// detects stale copies (double free, access after free) by validating the
/// block header on every use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Allocation {
    offset: usize,
    len: usize,
}

impl Allocation {
    /// Rebuild a handle from its parts.
    ///
    /// Handles built this way are checked like any other on use.
    #[must_use]
    pub const fn from_raw_parts(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Payload offset from the arena base.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Requested payload length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the requested length is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload byte range within the arena.
    #[must_use]
    pub const fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Heap usage summary. `used + free == total` always holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena capacity in bytes.
    pub total: usize,
    /// Bytes held by used blocks, headers included.
    pub used: usize,
    /// `total - used`.
    pub free: usize,
}

/// Why a block header failed validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Corruption {
    #[error("header lies outside the arena")]
    OutOfBounds,
    #[error("header is misaligned")]
    Misaligned,
    #[error("bad magic")]
    BadMagic,
    #[error("implausible block size")]
    BadSize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("heap not initialized")]
    NotInitialized,
    #[error("out of memory")]
    OutOfMemory,
    #[error("corrupted heap block at offset {offset:#x}: {reason}")]
    Corrupted { offset: usize, reason: Corruption },
    #[error("double free of block at offset {offset:#x}")]
    DoubleFree { offset: usize },
    #[error("block at offset {offset:#x} is not allocated")]
    NotAllocated { offset: usize },
    #[error("heap accessed re-entrantly")]
    Reentrant,
}
