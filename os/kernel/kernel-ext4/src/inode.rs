//! # Inodes
//!
//! Only the first 128 bytes of an inode record are decoded; larger inode
//! sizes carry extra timestamps and attributes the reader does not use.
//! The OS-dependent `osd2` area is read with its Linux layout.

use crate::Ext4Error;
use crate::bytes::{join_u64, read_array, read_u16_le, read_u32_le};
use bitfield_struct::bitfield;
use kernel_vfs::NodeType;

/// Inode number of the root directory.
pub const ROOT_INODE: u32 = 2;

/// Bytes of an inode record this reader decodes.
pub const INODE_RECORD_SIZE: usize = 128;

/// Size of the `i_block` area holding the extent root.
pub const INODE_BLOCK_AREA: usize = 60;

/// `i_mode`: file type and permission bits.
#[bitfield(u16, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct InodeMode {
    /// Permission, setuid, setgid and sticky bits.
    #[bits(12)]
    pub permissions: u16,
    /// File type (`S_IFMT >> 12`).
    #[bits(4)]
    pub file_type: u8,
}

impl InodeMode {
    /// VFS node type for this mode; unknown types read as regular files.
    #[must_use]
    pub const fn node_type(self) -> NodeType {
        NodeType::from_mode(self.into_bits())
    }
}

/// `i_flags`.
#[bitfield(u32, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct InodeFlags {
    pub secure_rm: bool,
    pub undelete: bool,
    pub compressed: bool,
    pub sync: bool,
    pub immutable: bool,
    pub append_only: bool,
    pub no_dump: bool,
    pub no_atime: bool,
    pub dirty: bool,
    pub compressed_blocks: bool,
    pub no_compress: bool,
    pub encrypted: bool,
    /// 0x1000: hashed directory index.
    pub index: bool,
    pub imagic: bool,
    pub journal_data: bool,
    pub no_tail: bool,
    pub dir_sync: bool,
    pub top_dir: bool,
    /// 0x40000: `i_blocks` counts file system blocks.
    pub huge_file: bool,
    /// 0x80000: `i_block` holds an extent tree.
    pub extents: bool,
    pub verity: bool,
    pub ea_inode: bool,
    #[bits(3)]
    __: u8,
    pub dax: bool,
    #[bits(2)]
    __: u8,
    /// 0x10000000: data is stored inside the inode.
    pub inline_data: bool,
    pub project_inherit: bool,
    pub casefold: bool,
    #[bits(1)]
    __: u8,
}

/// A decoded inode record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Inode {
    pub mode: InodeMode,
    uid_lo: u16,
    size_lo: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    gid_lo: u16,
    pub links_count: u16,
    blocks_lo: u32,
    pub flags: InodeFlags,
    /// Raw `i_block`: the extent tree root for extent-mapped files.
    pub block: [u8; INODE_BLOCK_AREA],
    pub generation: u32,
    file_acl_lo: u32,
    size_hi: u32,
    blocks_hi: u16,
    file_acl_hi: u16,
    uid_hi: u16,
    gid_hi: u16,
}

impl Inode {
    pub(crate) const fn zeroed() -> Self {
        Self {
            mode: InodeMode::new(),
            uid_lo: 0,
            size_lo: 0,
            atime: 0,
            ctime: 0,
            mtime: 0,
            dtime: 0,
            gid_lo: 0,
            links_count: 0,
            blocks_lo: 0,
            flags: InodeFlags::new(),
            block: [0; INODE_BLOCK_AREA],
            generation: 0,
            file_acl_lo: 0,
            size_hi: 0,
            blocks_hi: 0,
            file_acl_hi: 0,
            uid_hi: 0,
            gid_hi: 0,
        }
    }

    /// Decode an inode from the start of `buf`.
    ///
    /// # Errors
    /// [`Ext4Error::Truncated`] if `buf` holds fewer than 128 bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, Ext4Error> {
        const W: &str = "inode";

        let buf = buf.get(..INODE_RECORD_SIZE).ok_or(Ext4Error::Truncated(W))?;
        Ok(Self {
            mode: InodeMode::from_bits(read_u16_le(buf, 0x00, W)?),
            uid_lo: read_u16_le(buf, 0x02, W)?,
            size_lo: read_u32_le(buf, 0x04, W)?,
            atime: read_u32_le(buf, 0x08, W)?,
            ctime: read_u32_le(buf, 0x0C, W)?,
            mtime: read_u32_le(buf, 0x10, W)?,
            dtime: read_u32_le(buf, 0x14, W)?,
            gid_lo: read_u16_le(buf, 0x18, W)?,
            links_count: read_u16_le(buf, 0x1A, W)?,
            blocks_lo: read_u32_le(buf, 0x1C, W)?,
            flags: InodeFlags::from_bits(read_u32_le(buf, 0x20, W)?),
            block: read_array(buf, 0x28, W)?,
            generation: read_u32_le(buf, 0x64, W)?,
            file_acl_lo: read_u32_le(buf, 0x68, W)?,
            size_hi: read_u32_le(buf, 0x6C, W)?,
            blocks_hi: read_u16_le(buf, 0x74, W)?,
            file_acl_hi: read_u16_le(buf, 0x76, W)?,
            uid_hi: read_u16_le(buf, 0x78, W)?,
            gid_hi: read_u16_le(buf, 0x7A, W)?,
        })
    }

    /// File size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        join_u64(self.size_lo, self.size_hi)
    }

    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid_lo as u32 | (self.uid_hi as u32) << 16
    }

    #[must_use]
    pub const fn gid(&self) -> u32 {
        self.gid_lo as u32 | (self.gid_hi as u32) << 16
    }

    /// Allocated space in 512-byte units, as recorded on disk.
    #[must_use]
    pub const fn blocks(&self) -> u64 {
        join_u64(self.blocks_lo, self.blocks_hi as u32)
    }

    /// Extended attribute block.
    #[must_use]
    pub const fn file_acl(&self) -> u64 {
        join_u64(self.file_acl_lo, self.file_acl_hi as u32)
    }

    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.mode.node_type()
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.node_type().is_directory()
    }

    /// Number of blocks covering `size()` at `block_size`.
    #[must_use]
    pub const fn block_span(&self, block_size: u32) -> u64 {
        self.size().div_ceil(block_size as u64)
    }
}
