//! # Superblock
//!
//! The superblock lives at byte 1024 of the volume regardless of block
//! size and describes the volume geometry. Only the fields the reader
//! consumes are decoded.

use crate::Ext4Error;
use crate::bytes::{join_u64, read_array, read_u16_le, read_u32_le};
use bitfield_struct::bitfield;
use log::error;

/// Byte offset of the superblock on the device.
pub const SUPERBLOCK_OFFSET: u64 = 1024;

/// On-disk size of the superblock record.
pub const SUPERBLOCK_SIZE: usize = 1024;

/// `s_magic` of every ext2/3/4 volume.
pub const EXT4_SUPER_MAGIC: u16 = 0xEF53;

/// Largest supported `s_log_block_size` (64 KiB blocks).
const MAX_LOG_BLOCK_SIZE: u32 = 6;

/// Inode size of revision 0 volumes, which do not record one.
const GOOD_OLD_INODE_SIZE: u16 = 128;

/// Group descriptor size without the 64BIT feature.
pub const DESC_SIZE_32: usize = 32;

/// Smallest group descriptor size that carries the high halves.
pub const DESC_SIZE_64: usize = 64;

/// `s_feature_incompat`: features a reader must understand.
#[bitfield(u32, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct FeatureIncompat {
    /// 0x1
    pub compression: bool,
    /// 0x2: directory entries record the file type.
    pub filetype: bool,
    /// 0x4: the journal needs recovery.
    pub recover: bool,
    /// 0x8
    pub journal_dev: bool,
    /// 0x10
    pub meta_bg: bool,
    #[bits(1)]
    __: u8,
    /// 0x40: files use extent trees.
    pub extents: bool,
    /// 0x80: 64-bit block numbers and large group descriptors.
    pub is_64bit: bool,
    /// 0x100
    pub mmp: bool,
    /// 0x200
    pub flex_bg: bool,
    /// 0x400
    pub ea_inode: bool,
    #[bits(1)]
    __: u8,
    /// 0x1000
    pub dirdata: bool,
    /// 0x2000
    pub csum_seed: bool,
    /// 0x4000
    pub largedir: bool,
    /// 0x8000
    pub inline_data: bool,
    /// 0x10000
    pub encrypt: bool,
    /// 0x20000
    pub casefold: bool,
    #[bits(14)]
    __: u16,
}

/// `s_feature_ro_compat`: features a read-only mount may ignore.
#[bitfield(u32, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct FeatureRoCompat {
    /// 0x1
    pub sparse_super: bool,
    /// 0x2
    pub large_file: bool,
    /// 0x4
    pub btree_dir: bool,
    /// 0x8: `i_blocks` may be counted in file system blocks.
    pub huge_file: bool,
    /// 0x10
    pub gdt_csum: bool,
    /// 0x20
    pub dir_nlink: bool,
    /// 0x40
    pub extra_isize: bool,
    #[bits(1)]
    __: u8,
    /// 0x100
    pub quota: bool,
    /// 0x200
    pub bigalloc: bool,
    /// 0x400
    pub metadata_csum: bool,
    #[bits(21)]
    __: u32,
}

/// Decoded superblock fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub inodes_count: u32,
    blocks_count_lo: u32,
    blocks_count_hi: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub magic: u16,
    pub state: u16,
    pub rev_level: u32,
    inode_size: u16,
    pub feature_compat: u32,
    pub feature_incompat: FeatureIncompat,
    pub feature_ro_compat: FeatureRoCompat,
    pub uuid: [u8; 16],
    pub volume_name: [u8; 16],
    desc_size: u16,
}

impl Superblock {
    /// Decode and validate a superblock record.
    ///
    /// # Errors
    /// - [`Ext4Error::InvalidSuperblock`] for a bad magic or impossible geometry.
    /// - [`Ext4Error::UnsupportedLayout`] for block or inode sizes this reader
    ///   cannot handle.
    pub fn parse(buf: &[u8]) -> Result<Self, Ext4Error> {
        const W: &str = "superblock";

        let magic = read_u16_le(buf, 0x38, W)?;
        if magic != EXT4_SUPER_MAGIC {
            error!("Invalid superblock magic: {magic:#x}");
            return Err(Ext4Error::InvalidSuperblock("bad magic"));
        }

        let sb = Self {
            inodes_count: read_u32_le(buf, 0x00, W)?,
            blocks_count_lo: read_u32_le(buf, 0x04, W)?,
            free_blocks_count: read_u32_le(buf, 0x0C, W)?,
            free_inodes_count: read_u32_le(buf, 0x10, W)?,
            first_data_block: read_u32_le(buf, 0x14, W)?,
            log_block_size: read_u32_le(buf, 0x18, W)?,
            blocks_per_group: read_u32_le(buf, 0x20, W)?,
            inodes_per_group: read_u32_le(buf, 0x28, W)?,
            magic,
            state: read_u16_le(buf, 0x3A, W)?,
            rev_level: read_u32_le(buf, 0x4C, W)?,
            inode_size: read_u16_le(buf, 0x58, W)?,
            feature_compat: read_u32_le(buf, 0x5C, W)?,
            feature_incompat: FeatureIncompat::from_bits(read_u32_le(buf, 0x60, W)?),
            feature_ro_compat: FeatureRoCompat::from_bits(read_u32_le(buf, 0x64, W)?),
            uuid: read_array(buf, 0x68, W)?,
            volume_name: read_array(buf, 0x78, W)?,
            desc_size: read_u16_le(buf, 0xFE, W)?,
            blocks_count_hi: read_u32_le(buf, 0x150, W)?,
        };
        sb.check_geometry()?;
        Ok(sb)
    }

    fn check_geometry(&self) -> Result<(), Ext4Error> {
        if self.log_block_size > MAX_LOG_BLOCK_SIZE {
            error!("Unsupported block size shift {}", self.log_block_size);
            return Err(Ext4Error::UnsupportedLayout("block size"));
        }
        if self.blocks_per_group == 0 || self.inodes_per_group == 0 {
            error!("Superblock declares empty block groups");
            return Err(Ext4Error::InvalidSuperblock("empty block groups"));
        }
        if self.blocks_count() == 0 {
            return Err(Ext4Error::InvalidSuperblock("zero blocks"));
        }
        let inode_size = self.inode_size();
        if inode_size < usize::from(GOOD_OLD_INODE_SIZE)
            || inode_size > self.block_size() as usize
            || !inode_size.is_power_of_two()
        {
            error!("Unsupported inode size {inode_size}");
            return Err(Ext4Error::UnsupportedLayout("inode size"));
        }
        Ok(())
    }

    /// Block size in bytes: `1024 << s_log_block_size`.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        1024 << self.log_block_size
    }

    /// Total block count; the high half only exists with the 64BIT feature.
    #[must_use]
    pub const fn blocks_count(&self) -> u64 {
        if self.feature_incompat.is_64bit() {
            join_u64(self.blocks_count_lo, self.blocks_count_hi)
        } else {
            self.blocks_count_lo as u64
        }
    }

    /// Number of block groups, rounded up.
    #[must_use]
    pub const fn groups_count(&self) -> u64 {
        self.blocks_count().div_ceil(self.blocks_per_group as u64)
    }

    /// On-disk inode record size.
    #[must_use]
    pub fn inode_size(&self) -> usize {
        if self.rev_level == 0 {
            usize::from(GOOD_OLD_INODE_SIZE)
        } else {
            usize::from(self.inode_size)
        }
    }

    /// Group descriptor size: `s_desc_size` for 64-bit volumes, 32 otherwise.
    #[must_use]
    pub fn desc_size(&self) -> usize {
        let declared = usize::from(self.desc_size);
        if self.feature_incompat.is_64bit() && declared >= DESC_SIZE_64 {
            declared
        } else {
            DESC_SIZE_32
        }
    }

    /// First block of the group descriptor table.
    #[must_use]
    pub const fn gdt_start_block(&self) -> u64 {
        self.first_data_block as u64 + 1
    }

    /// Volume label up to the first NUL, if it is valid UTF-8.
    #[must_use]
    pub fn volume_name(&self) -> Option<&str> {
        let len = self
            .volume_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.volume_name.len());
        core::str::from_utf8(&self.volume_name[..len]).ok()
    }
}
