use crate::header::{ALLOC_MAGIC, BlockHeader, HEADER_SIZE};
use crate::{Allocation, Corruption, HeapError, HeapStats};
use core::ops::Range;
use log::{error, info, trace};

/// Payload alignment and size granularity.
pub const ALIGN: usize = 16;

/// Smallest block worth splitting off: a header plus one aligned payload unit.
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + ALIGN;

/// Byte storage an arena can be carved out of.
pub trait ArenaStorage: AsRef<[u8]> + AsMut<[u8]> {}

impl<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized> ArenaStorage for T {}

/// Align `value` upwards to `align` (must be a power of two), `None` on overflow.
#[inline]
const fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// A validated view of one block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header from the arena base.
    pub offset: usize,
    /// Total block size including the header.
    pub size: usize,
    /// Whether the block is handed out.
    pub used: bool,
}

impl BlockInfo {
    /// Payload bytes available behind the header.
    #[must_use]
    pub const fn payload_capacity(&self) -> usize {
        self.size - HEADER_SIZE
    }
}

/// A first-fit, split-and-merge heap over a fixed arena.
///
/// The free list is **implicit**: every block starts with a [`BlockHeader`]
/// and the next block begins `size` bytes later. Walking from offset zero
/// visits every block in address order.
///
/// # Invariants
/// - Block sizes summed from the arena base equal [`capacity`](Self::capacity).
/// - Every block offset and size is a multiple of [`ALIGN`].
/// - Only the immediately following block is merged on free.
pub struct Heap<S> {
    storage: S,
    /// Lazily set on first call to [`init`](Self::init).
    initialized: bool,
    /// Bytes (headers included) held by used blocks.
    used: usize,
}

impl<S> Heap<S> {
    /// Construct a heap over `storage` (not yet initialized).
    pub const fn new(storage: S) -> Self {
        Self {
            storage,
            initialized: false,
            used: 0,
        }
    }

    /// Indicates whether the heap has been initialized.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Give back the backing storage.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl<S: ArenaStorage> Heap<S> {
    /// Usable arena size: the storage length rounded down to [`ALIGN`].
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len() & !(ALIGN - 1)
    }

    fn arena(&self) -> &[u8] {
        let capacity = self.capacity();
        &self.storage.as_ref()[..capacity]
    }

    fn arena_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.storage.as_mut()[..capacity]
    }

    /// Caller guarantees `offset + HEADER_SIZE <= capacity`.
    fn read_header(&self, offset: usize) -> BlockHeader {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.arena()[offset..offset + HEADER_SIZE]);
        BlockHeader::decode(raw)
    }

    fn write_header(&mut self, offset: usize, header: BlockHeader) {
        self.arena_mut()[offset..offset + HEADER_SIZE].copy_from_slice(&header.encode());
    }

    /// Initialize the heap: zero the arena and install one free block spanning it.
    ///
    /// Subsequent calls are no-ops.
    ///
    /// # Errors
    /// [`HeapError::InvalidArgument`] if the arena cannot hold a single minimum block.
    pub fn init(&mut self) -> Result<(), HeapError> {
        if self.initialized {
            return Ok(());
        }

        let capacity = self.capacity();
        if capacity < MIN_BLOCK_SIZE {
            error!("Heap arena of {capacity} bytes is too small");
            return Err(HeapError::InvalidArgument);
        }

        info!("Initializing kernel heap");
        self.arena_mut().fill(0);
        self.write_header(0, BlockHeader::tagged(capacity, false));
        self.used = 0;
        self.initialized = true;
        info!("Kernel heap initialized, size: {capacity} bytes");
        Ok(())
    }

    /// Check the header at `offset` for bounds, alignment, magic and size sanity.
    fn validate(&self, offset: usize) -> Result<BlockInfo, Corruption> {
        let capacity = self.capacity();
        if offset
            .checked_add(HEADER_SIZE)
            .is_none_or(|end| end > capacity)
        {
            return Err(Corruption::OutOfBounds);
        }
        if offset % ALIGN != 0 {
            return Err(Corruption::Misaligned);
        }

        let header = self.read_header(offset);
        if header.magic() != ALLOC_MAGIC {
            return Err(Corruption::BadMagic);
        }

        let size = usize::try_from(header.size()).map_err(|_| Corruption::BadSize)?;
        if size < HEADER_SIZE || size > capacity - offset || size % ALIGN != 0 {
            return Err(Corruption::BadSize);
        }

        Ok(BlockInfo {
            offset,
            size,
            used: header.used(),
        })
    }

    /// Validate and resolve the live block behind `allocation`.
    fn live_block(&self, allocation: Allocation) -> Result<BlockInfo, HeapError> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let offset = allocation
            .offset()
            .checked_sub(HEADER_SIZE)
            .ok_or(HeapError::Corrupted {
                offset: allocation.offset(),
                reason: Corruption::OutOfBounds,
            })?;
        let block = self
            .validate(offset)
            .map_err(|reason| HeapError::Corrupted { offset, reason })?;
        if !block.used {
            return Err(HeapError::NotAllocated { offset });
        }
        Ok(block)
    }

    /// First-fit search for a free block of at least `needed` bytes.
    fn find_free_block(&self, needed: usize) -> Result<Option<BlockInfo>, HeapError> {
        let capacity = self.capacity();
        let mut offset = 0;
        while offset < capacity {
            let block = self.validate(offset).map_err(|reason| {
                error!("Corrupted heap detected at offset {offset:#x}: {reason}");
                HeapError::Corrupted { offset, reason }
            })?;
            if !block.used && block.size >= needed {
                return Ok(Some(block));
            }
            offset += block.size;
        }
        Ok(None)
    }

    /// Mark `block` used, splitting off the tail if it is large enough to stand alone.
    ///
    /// Returns the size of the block handed out.
    fn split_block(&mut self, block: BlockInfo, needed: usize) -> usize {
        if block.size >= needed + MIN_BLOCK_SIZE {
            self.write_header(
                block.offset + needed,
                BlockHeader::tagged(block.size - needed, false),
            );
            self.write_header(block.offset, BlockHeader::tagged(needed, true));
            needed
        } else {
            self.write_header(block.offset, BlockHeader::tagged(block.size, true));
            block.size
        }
    }

    /// Allocate `size` bytes.
    ///
    /// The request is rounded up to [`ALIGN`] and served first-fit. An
    /// uninitialized heap is initialized on the way.
    ///
    /// # Errors
    /// - [`HeapError::InvalidArgument`] for `size == 0`.
    /// - [`HeapError::OutOfMemory`] if no free block is large enough.
    /// - [`HeapError::Corrupted`] if the walk meets a damaged header.
    pub fn allocate(&mut self, size: usize) -> Result<Allocation, HeapError> {
        if size == 0 {
            return Err(HeapError::InvalidArgument);
        }
        if !self.initialized {
            self.init()?;
        }

        let needed = checked_align_up(size, ALIGN).and_then(|s| s.checked_add(HEADER_SIZE));
        let found = match needed {
            Some(needed) => self.find_free_block(needed)?.map(|block| (block, needed)),
            None => None,
        };
        let Some((block, needed)) = found else {
            error!("Failed to allocate {size} bytes (out of memory)");
            return Err(HeapError::OutOfMemory);
        };

        let taken = self.split_block(block, needed);
        self.used += taken;
        trace!(
            "Allocated {size} bytes in block {:#x} ({taken} bytes)",
            block.offset
        );
        Ok(Allocation::from_raw_parts(block.offset + HEADER_SIZE, size))
    }

    /// Allocate `size` bytes and zero them.
    ///
    /// # Errors
    /// As [`allocate`](Self::allocate).
    pub fn zero_allocate(&mut self, size: usize) -> Result<Allocation, HeapError> {
        let allocation = self.allocate(size)?;
        self.bytes_mut(allocation)?.fill(0);
        Ok(allocation)
    }

    /// Release `allocation`.
    ///
    /// On an uninitialized heap this does nothing. Invalid handles and double
    /// frees are logged and reported; the heap is left untouched in that case.
    ///
    /// # Errors
    /// - [`HeapError::Corrupted`] if the header is out of bounds or damaged.
    /// - [`HeapError::DoubleFree`] if the block is already free.
    pub fn free(&mut self, allocation: Allocation) -> Result<(), HeapError> {
        if !self.initialized {
            return Ok(());
        }

        let block = match self.live_block(allocation) {
            Ok(block) => block,
            Err(HeapError::NotAllocated { offset }) => {
                error!(
                    "Double free detected at offset {:#x}",
                    allocation.offset()
                );
                return Err(HeapError::DoubleFree { offset });
            }
            Err(e) => {
                error!(
                    "Attempt to free invalid memory at offset {:#x}: {e}",
                    allocation.offset()
                );
                return Err(e);
            }
        };

        self.write_header(block.offset, BlockHeader::tagged(block.size, false));
        self.used = self.used.saturating_sub(block.size);
        self.merge_with_next(block);
        Ok(())
    }

    /// Absorb the immediately following block if it is valid and free.
    fn merge_with_next(&mut self, block: BlockInfo) {
        let next = block.offset + block.size;
        if next >= self.capacity() {
            return;
        }
        let Ok(neighbour) = self.validate(next) else {
            return;
        };
        if neighbour.used {
            return;
        }

        self.write_header(
            block.offset,
            BlockHeader::tagged(block.size + neighbour.size, false),
        );
        // The absorbed header must never validate again.
        let absorbed = self.read_header(next).with_magic(0);
        self.write_header(next, absorbed);
    }

    /// Resize an allocation.
    ///
    /// - `None` behaves as [`allocate`](Self::allocate).
    /// - `size == 0` frees the allocation and returns `None`.
    /// - A size that still fits the block keeps the block in place; the block
    ///   is never shrunk.
    /// - Otherwise the contents move to a fresh block and the old one is freed.
    ///
    /// # Errors
    /// Allocation and validation errors as in [`allocate`](Self::allocate) and
    /// [`free`](Self::free); [`HeapError::NotAllocated`] for a freed handle.
    pub fn resize(
        &mut self,
        allocation: Option<Allocation>,
        size: usize,
    ) -> Result<Option<Allocation>, HeapError> {
        let Some(allocation) = allocation else {
            return self.allocate(size).map(Some);
        };

        if size == 0 {
            self.free(allocation)?;
            return Ok(None);
        }

        let block = self.live_block(allocation).inspect_err(|e| {
            error!(
                "Attempt to realloc invalid memory at offset {:#x}: {e}",
                allocation.offset()
            );
        })?;

        let capacity = block.payload_capacity();
        if size <= capacity {
            return Ok(Some(Allocation::from_raw_parts(allocation.offset(), size)));
        }

        let moved = self.allocate(size)?;
        let copied = capacity.min(size);
        let from = allocation.offset();
        self.arena_mut()
            .copy_within(from..from + copied, moved.offset());
        self.free(allocation)?;
        Ok(Some(moved))
    }

    /// Heap usage summary.
    ///
    /// # Errors
    /// [`HeapError::NotInitialized`] before [`init`](Self::init).
    pub fn stats(&self) -> Result<HeapStats, HeapError> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let total = self.capacity();
        Ok(HeapStats {
            total,
            used: self.used,
            free: total - self.used,
        })
    }

    /// Payload capacity of the block behind `allocation`.
    ///
    /// # Errors
    /// Validation errors for stale or forged handles.
    pub fn payload_capacity(&self, allocation: Allocation) -> Result<usize, HeapError> {
        self.live_block(allocation).map(|b| b.payload_capacity())
    }

    fn payload_range(&self, allocation: Allocation) -> Result<Range<usize>, HeapError> {
        let block = self.live_block(allocation)?;
        if allocation.len() > block.payload_capacity() {
            return Err(HeapError::InvalidArgument);
        }
        Ok(allocation.offset()..allocation.offset() + allocation.len())
    }

    /// The `len()` payload bytes of a live allocation.
    ///
    /// # Errors
    /// Validation errors for stale or forged handles.
    pub fn bytes(&self, allocation: Allocation) -> Result<&[u8], HeapError> {
        let range = self.payload_range(allocation)?;
        Ok(&self.arena()[range])
    }

    /// Mutable access to the `len()` payload bytes of a live allocation.
    ///
    /// # Errors
    /// Validation errors for stale or forged handles.
    pub fn bytes_mut(&mut self, allocation: Allocation) -> Result<&mut [u8], HeapError> {
        let range = self.payload_range(allocation)?;
        Ok(&mut self.arena_mut()[range])
    }

    /// Walk all blocks in address order.
    ///
    /// The walk yields an error and stops at the first damaged header.
    pub fn blocks(&self) -> Blocks<'_, S> {
        Blocks {
            heap: self,
            offset: 0,
            done: !self.initialized,
        }
    }
}

/// Iterator over the blocks of a [`Heap`].
pub struct Blocks<'a, S> {
    heap: &'a Heap<S>,
    offset: usize,
    done: bool,
}

impl<S: ArenaStorage> Iterator for Blocks<'_, S> {
    type Item = Result<BlockInfo, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.heap.capacity() {
            return None;
        }
        let offset = self.offset;
        match self.heap.validate(offset) {
            Ok(block) => {
                self.offset += block.size;
                Some(Ok(block))
            }
            Err(reason) => {
                self.done = true;
                Some(Err(HeapError::Corrupted { offset, reason }))
            }
        }
    }
}

impl<S: ArenaStorage> core::iter::FusedIterator for Blocks<'_, S> {}
