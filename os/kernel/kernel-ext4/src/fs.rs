use crate::Ext4Error;
use crate::dir::{DirBlock, RawDirEntry};
use crate::extent::{self, PhysicalBlock, Step};
use crate::group::GroupDescriptor;
use crate::inode::{Inode, ROOT_INODE};
use crate::node::Ext4Node;
use crate::superblock::{SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE, Superblock};
use kernel_alloc::{ArenaStorage, HeapBuffer, SharedHeap};
use kernel_block::BlockDevice;
use kernel_vfs::DirEntry;
use log::{debug, error, info, warn};

/// A mounted, read-only EXT4 filesystem.
///
/// The handle borrows its device and heap for its whole lifetime and owns
/// the group descriptor table, which lives in a heap buffer released on
/// [`unmount`](Self::unmount) (or drop). Nodes borrow the handle, so none
/// can outlive it.
pub struct Ext4Fs<'a, D: BlockDevice, S: ArenaStorage> {
    device: &'a D,
    heap: &'a SharedHeap<S>,
    superblock: Superblock,
    block_size: u32,
    groups_count: u32,
    desc_size: usize,
    gdt: HeapBuffer<'a, S>,
    root: Inode,
}

impl<'a, D: BlockDevice, S: ArenaStorage> Ext4Fs<'a, D, S> {
    /// Mount the filesystem on `device`, taking scratch memory from `heap`.
    ///
    /// Every buffer acquired on the way is released again if mounting fails.
    ///
    /// # Errors
    /// - [`Ext4Error::InvalidSuperblock`] if the device holds no EXT4 volume.
    /// - [`Ext4Error::UnsupportedLayout`] for geometries this reader cannot handle.
    /// - [`Ext4Error::Io`] and [`Ext4Error::Heap`] for device and memory failures.
    /// - Any error of [`read_inode`](Self::read_inode) for the root directory.
    pub fn mount(device: &'a D, heap: &'a SharedHeap<S>) -> Result<Self, Ext4Error> {
        info!("Mounting filesystem on device {}", device.name());
        Self::try_mount(device, heap).inspect_err(|e| {
            error!("Failed to mount {}: {e}", device.name());
        })
    }

    fn try_mount(device: &'a D, heap: &'a SharedHeap<S>) -> Result<Self, Ext4Error> {
        let mut raw = heap.buffer(SUPERBLOCK_SIZE)?;
        raw.with_mut(|b| device.read(SUPERBLOCK_OFFSET, b))??;
        let superblock = raw.with(Superblock::parse)??;
        drop(raw);

        let block_size = superblock.block_size();
        let groups_count = u32::try_from(superblock.groups_count())
            .map_err(|_| Ext4Error::InvalidSuperblock("too many block groups"))?;
        let desc_size = superblock.desc_size();

        info!(
            "Filesystem geometry: {} blocks of {block_size} bytes, {groups_count} groups of {} inodes",
            superblock.blocks_count(),
            superblock.inodes_per_group,
        );
        if !superblock.feature_incompat.extents() {
            warn!("Volume does not use extents; file contents will be unreadable");
        }

        let table_bytes = usize::try_from(groups_count)
            .ok()
            .and_then(|g| g.checked_mul(desc_size))
            .ok_or(Ext4Error::InvalidSuperblock("descriptor table too large"))?;
        let bs = block_size as usize;
        let gdt_blocks = table_bytes.div_ceil(bs);
        let mut gdt = heap.buffer(gdt_blocks * bs)?;
        let gdt_offset = superblock
            .gdt_start_block()
            .checked_mul(u64::from(block_size))
            .ok_or(Ext4Error::InvalidSuperblock("descriptor table out of range"))?;
        gdt.with_mut(|b| device.read(gdt_offset, b))??;
        debug!(
            "Read {gdt_blocks} group descriptor blocks starting at block {}",
            superblock.gdt_start_block()
        );

        let mut fs = Self {
            device,
            heap,
            superblock,
            block_size,
            groups_count,
            desc_size,
            gdt,
            root: Inode::zeroed(),
        };
        fs.root = fs.read_inode(ROOT_INODE)?;
        if !fs.root.is_dir() {
            warn!("Root inode is not a directory");
        }

        info!("Filesystem mounted successfully");
        Ok(fs)
    }

    /// Release the filesystem. The descriptor table returns to the heap.
    pub fn unmount(self) {
        info!("Unmounting filesystem on device {}", self.device.name());
    }

    #[must_use]
    pub const fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    #[must_use]
    pub const fn groups_count(&self) -> u32 {
        self.groups_count
    }

    #[must_use]
    pub const fn device(&self) -> &'a D {
        self.device
    }

    /// The root directory.
    #[must_use]
    pub const fn root(&self) -> Ext4Node<'_, 'a, D, S> {
        Ext4Node::new(self, ROOT_INODE, self.root)
    }

    /// Read block `block` into `buf`, which must be exactly one block long.
    ///
    /// # Errors
    /// [`Ext4Error::InvalidArgument`] for a wrongly sized buffer or an
    /// unaddressable block, [`Ext4Error::Io`] on device failure.
    pub fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), Ext4Error> {
        if buf.len() != self.block_size as usize {
            return Err(Ext4Error::InvalidArgument);
        }
        let offset = block
            .checked_mul(u64::from(self.block_size))
            .ok_or(Ext4Error::InvalidArgument)?;
        self.device.read(offset, buf).inspect_err(|e| {
            error!("Failed to read block {block}: {e}");
        })?;
        Ok(())
    }

    /// Descriptor of block group `group`.
    ///
    /// # Errors
    /// [`Ext4Error::InvalidArgument`] if `group` does not exist.
    pub fn group_descriptor(&self, group: u32) -> Result<GroupDescriptor, Ext4Error> {
        if group >= self.groups_count {
            return Err(Ext4Error::InvalidArgument);
        }
        let offset = group as usize * self.desc_size;
        let desc_size = self.desc_size;
        self.gdt.with(|table| {
            let record = table.get(offset..).ok_or(Ext4Error::Truncated("group descriptor"))?;
            GroupDescriptor::parse(record, desc_size)
        })?
    }

    /// Read inode `num`.
    ///
    /// # Errors
    /// - [`Ext4Error::InvalidArgument`] for inode 0.
    /// - [`Ext4Error::InodeOutOfRange`] if the inode's group does not exist.
    /// - [`Ext4Error::Io`] and [`Ext4Error::Heap`] for device and memory failures.
    pub fn read_inode(&self, num: u32) -> Result<Inode, Ext4Error> {
        if num == 0 {
            return Err(Ext4Error::InvalidArgument);
        }

        let per_group = self.superblock.inodes_per_group;
        let group = (num - 1) / per_group;
        if group >= self.groups_count {
            error!(
                "Invalid inode number {num} (group {group} >= groups count {})",
                self.groups_count
            );
            return Err(Ext4Error::InodeOutOfRange(num));
        }
        let index = u64::from((num - 1) % per_group);

        let table = self.group_descriptor(group)?.inode_table;
        let inode_size = self.superblock.inode_size();
        let byte = index * inode_size as u64;
        let bs = u64::from(self.block_size);
        let block = table
            .checked_add(byte / bs)
            .ok_or(Ext4Error::InvalidArgument)?;
        let offset = usize::try_from(byte % bs).map_err(|_| Ext4Error::InvalidArgument)?;

        let mut scratch = self.heap.buffer(self.block_size as usize)?;
        scratch.with_mut(|b| self.read_block(block, b))??;
        scratch.with(|b| {
            let record = b
                .get(offset..offset + inode_size)
                .ok_or(Ext4Error::Truncated("inode"))?;
            Inode::parse(record)
        })?
    }

    /// Map logical block `logical` of `inode` to a physical block.
    ///
    /// # Errors
    /// - [`Ext4Error::UnsupportedLayout`] unless both the volume and the
    ///   inode use extents.
    /// - [`Ext4Error::CorruptedExtentTree`] for malformed trees or a block no
    ///   extent covers.
    /// - [`Ext4Error::Io`] and [`Ext4Error::Heap`] for device and memory failures.
    pub fn read_extent_block(
        &self,
        inode: &Inode,
        logical: u64,
    ) -> Result<PhysicalBlock, Ext4Error> {
        if !self.superblock.feature_incompat.extents() {
            warn!("Filesystem does not use extents");
            return Err(Ext4Error::UnsupportedLayout("block maps"));
        }
        if !inode.flags.extents() {
            warn!("Inode is not using extents");
            return Err(Ext4Error::UnsupportedLayout("block maps"));
        }

        let mut next = extent::step(&inode.block, logical, None)?;
        if let Step::Found(physical) = next {
            return Ok(physical);
        }

        let mut node = self.heap.buffer(self.block_size as usize)?;
        loop {
            match next {
                Step::Found(physical) => return Ok(physical),
                Step::Descend { block, depth } => {
                    node.with_mut(|b| self.read_block(block, b))??;
                    next = node.with(|b| extent::step(b, logical, Some(depth)))??;
                }
            }
        }
    }

    /// Physical location of file block `logical`; `None` past the end of file.
    ///
    /// # Errors
    /// As [`read_extent_block`](Self::read_extent_block).
    pub fn map_file_block(
        &self,
        inode: &Inode,
        logical: u64,
    ) -> Result<Option<PhysicalBlock>, Ext4Error> {
        if logical >= inode.block_span(self.block_size) {
            return Ok(None);
        }
        self.read_extent_block(inode, logical).map(Some)
    }

    /// Fill `buf` from a mapped block; holes past EOF and unwritten extents read as zeros.
    fn load_block(&self, mapping: Option<PhysicalBlock>, buf: &mut [u8]) -> Result<(), Ext4Error> {
        match mapping {
            Some(PhysicalBlock {
                block,
                unwritten: false,
            }) => self.read_block(block, buf),
            _ => {
                buf.fill(0);
                Ok(())
            }
        }
    }

    /// Read logical block `logical` of `inode` into `buf`.
    ///
    /// Blocks at or past the end of the file read as zeros.
    ///
    /// # Errors
    /// [`Ext4Error::InvalidArgument`] unless `buf` is one block long, otherwise
    /// as [`read_extent_block`](Self::read_extent_block).
    pub fn read_file_block(
        &self,
        inode: &Inode,
        logical: u64,
        buf: &mut [u8],
    ) -> Result<(), Ext4Error> {
        if buf.len() != self.block_size as usize {
            return Err(Ext4Error::InvalidArgument);
        }
        let mapping = self.map_file_block(inode, logical)?;
        self.load_block(mapping, buf)
    }

    fn read_file_block_into(
        &self,
        inode: &Inode,
        logical: u64,
        scratch: &mut HeapBuffer<'a, S>,
    ) -> Result<(), Ext4Error> {
        let mapping = self.map_file_block(inode, logical)?;
        scratch.with_mut(|b| self.load_block(mapping, b))?
    }

    /// Read up to `buf.len()` bytes at `offset`, clipped to the file size.
    ///
    /// Returns the number of bytes copied, `0` at or past the end of file.
    /// `buf` must not live in the heap this filesystem allocates from.
    ///
    /// # Errors
    /// As [`read_file_block`](Self::read_file_block).
    pub fn read_file_data(
        &self,
        inode: &Inode,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, Ext4Error> {
        let size = inode.size();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let len = buf.len().min(available);
        if len < buf.len() {
            debug!("Read of {} bytes at {offset} clipped to {len}", buf.len());
        }

        let bs = u64::from(self.block_size);
        let mut scratch = self.heap.buffer(self.block_size as usize)?;
        let mut done = 0;
        while done < len {
            let pos = offset + done as u64;
            let in_block = usize::try_from(pos % bs).map_err(|_| Ext4Error::InvalidArgument)?;
            let n = (self.block_size as usize - in_block).min(len - done);

            self.read_file_block_into(inode, pos / bs, &mut scratch)?;
            scratch.copy_out(in_block, &mut buf[done..done + n])?;
            done += n;
        }
        Ok(done)
    }

    /// Visit every live entry of directory `dir` in on-disk order until
    /// `visit` returns `Some`.
    fn scan_dir<T>(
        &self,
        dir: &Inode,
        mut visit: impl FnMut(&RawDirEntry<'_>) -> Option<T>,
    ) -> Result<Option<T>, Ext4Error> {
        if !dir.is_dir() {
            return Err(Ext4Error::NotADirectory);
        }

        let mut scratch = self.heap.buffer(self.block_size as usize)?;
        for logical in 0..dir.block_span(self.block_size) {
            self.read_file_block_into(dir, logical, &mut scratch)
                .inspect_err(|e| error!("Failed to read directory block {logical}: {e}"))?;
            let found = scratch.with(|block| {
                DirBlock::new(block)
                    .filter(RawDirEntry::is_live)
                    .find_map(|entry| visit(&entry))
            })?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Inode number of the entry called `name` in directory `dir`.
    ///
    /// # Errors
    /// [`Ext4Error::NotFound`] if there is no such entry,
    /// [`Ext4Error::NotADirectory`] if `dir` is not a directory.
    pub fn find_dir_entry(&self, dir: &Inode, name: &[u8]) -> Result<u32, Ext4Error> {
        self.scan_dir(dir, |entry| (entry.name == name).then_some(entry.inode))?
            .ok_or(Ext4Error::NotFound)
    }

    /// The `index`-th live entry of directory `dir`.
    ///
    /// # Errors
    /// [`Ext4Error::NotFound`] past the last entry,
    /// [`Ext4Error::NotADirectory`] if `dir` is not a directory.
    pub fn readdir_entry(&self, dir: &Inode, index: u32) -> Result<DirEntry, Ext4Error> {
        let mut seen = 0;
        self.scan_dir(dir, |entry| {
            if seen == index {
                return Some(DirEntry::new(entry.inode, entry.node_type(), entry.name));
            }
            seen += 1;
            None
        })?
        .ok_or(Ext4Error::NotFound)
    }

    /// Build a VFS node for inode `num`.
    ///
    /// # Errors
    /// As [`read_inode`](Self::read_inode).
    pub fn create_vfs_node(&self, num: u32) -> Result<Ext4Node<'_, 'a, D, S>, Ext4Error> {
        let inode = self.read_inode(num)?;
        Ok(Ext4Node::new(self, num, inode))
    }
}
