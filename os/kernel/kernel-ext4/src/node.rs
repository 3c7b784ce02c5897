use crate::Ext4Error;
use crate::fs::Ext4Fs;
use crate::inode::Inode;
use kernel_alloc::ArenaStorage;
use kernel_block::BlockDevice;
use kernel_vfs::{DirEntry, NodeMetadata, OpenFlags, Stat, VfsNode};
use log::{debug, trace};

/// An inode of a mounted [`Ext4Fs`], seen through the VFS.
///
/// The node carries a copy of the inode taken when it was created; later
/// changes on disk are not observed.
pub struct Ext4Node<'f, 'a, D: BlockDevice, S: ArenaStorage> {
    fs: &'f Ext4Fs<'a, D, S>,
    number: u32,
    inode: Inode,
}

impl<'f, 'a, D: BlockDevice, S: ArenaStorage> Ext4Node<'f, 'a, D, S> {
    pub(crate) const fn new(fs: &'f Ext4Fs<'a, D, S>, number: u32, inode: Inode) -> Self {
        Self { fs, number, inode }
    }

    #[must_use]
    pub const fn inode_number(&self) -> u32 {
        self.number
    }

    /// The on-disk inode as captured at creation.
    #[must_use]
    pub const fn inode(&self) -> &Inode {
        &self.inode
    }

    #[must_use]
    pub const fn filesystem(&self) -> &'f Ext4Fs<'a, D, S> {
        self.fs
    }

    fn ensure_dir(&self) -> Result<(), Ext4Error> {
        if self.inode.is_dir() {
            Ok(())
        } else {
            Err(Ext4Error::NotADirectory)
        }
    }
}

impl<D: BlockDevice, S: ArenaStorage> Clone for Ext4Node<'_, '_, D, S> {
    fn clone(&self) -> Self {
        Self {
            fs: self.fs,
            number: self.number,
            inode: self.inode,
        }
    }
}

impl<D: BlockDevice, S: ArenaStorage> core::fmt::Debug for Ext4Node<'_, '_, D, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ext4Node")
            .field("number", &self.number)
            .field("node_type", &self.inode.node_type())
            .field("size", &self.inode.size())
            .finish_non_exhaustive()
    }
}

impl<D: BlockDevice, S: ArenaStorage> VfsNode for Ext4Node<'_, '_, D, S> {
    type Error = Ext4Error;

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            inode: self.number,
            node_type: self.inode.node_type(),
            permissions: self.inode.mode.permissions(),
            uid: self.inode.uid(),
            gid: self.inode.gid(),
            size: self.inode.size(),
            links: self.inode.links_count,
            atime: self.inode.atime,
            mtime: self.inode.mtime,
            ctime: self.inode.ctime,
        }
    }

    /// Opening always succeeds; write intent is accepted and logged, since
    /// [`write`](VfsNode::write) stores nothing.
    fn open(&self, flags: OpenFlags) -> Result<(), Self::Error> {
        trace!("open inode {} with {flags:?}", self.number);
        if flags.wants_write() {
            debug!("Inode {} opened for writing on a read-only filesystem", self.number);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.fs.read_file_data(&self.inode, offset, buf)
    }

    /// The filesystem is read-only; nothing is ever written.
    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn readdir(&self, index: u32) -> Result<Option<DirEntry>, Self::Error> {
        self.ensure_dir()?;
        match self.fs.readdir_entry(&self.inode, index) {
            Ok(entry) => Ok(Some(entry)),
            Err(Ext4Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn finddir(&self, name: &[u8]) -> Result<Option<Self>, Self::Error> {
        self.ensure_dir()?;
        let number = match self.fs.find_dir_entry(&self.inode, name) {
            Ok(number) => number,
            Err(Ext4Error::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.fs.create_vfs_node(number).map(Some)
    }

    fn stat(&self) -> Result<Stat, Self::Error> {
        Ok(Stat {
            dev: 0,
            ino: self.number,
            mode: self.inode.mode.into_bits(),
            nlink: self.inode.links_count,
            uid: self.inode.uid(),
            gid: self.inode.gid(),
            rdev: 0,
            size: self.inode.size(),
            blksize: self.fs.block_size(),
            blocks: self.inode.blocks(),
            atime: self.inode.atime,
            mtime: self.inode.mtime,
            ctime: self.inode.ctime,
        })
    }
}
