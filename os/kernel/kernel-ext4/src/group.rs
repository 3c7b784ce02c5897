use crate::Ext4Error;
use crate::bytes::{join_u64, read_u16_le, read_u32_le};
use crate::superblock::DESC_SIZE_64;

/// A block group descriptor.
///
/// Block numbers join their high halves when the descriptor is large
/// enough to carry them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub block_bitmap: u64,
    pub inode_bitmap: u64,
    pub inode_table: u64,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub used_dirs_count: u32,
    pub flags: u16,
}

impl GroupDescriptor {
    /// Decode the descriptor at the start of `buf`.
    ///
    /// # Errors
    /// [`Ext4Error::Truncated`] if `buf` is shorter than `desc_size`.
    pub fn parse(buf: &[u8], desc_size: usize) -> Result<Self, Ext4Error> {
        const W: &str = "group descriptor";

        let buf = buf.get(..desc_size).ok_or(Ext4Error::Truncated(W))?;
        let wide = desc_size >= DESC_SIZE_64;
        let hi32 = |off| if wide { read_u32_le(buf, off, W) } else { Ok(0) };
        let hi16 = |off| {
            if wide {
                read_u16_le(buf, off, W).map(|v| u32::from(v) << 16)
            } else {
                Ok(0)
            }
        };

        Ok(Self {
            block_bitmap: join_u64(read_u32_le(buf, 0x00, W)?, hi32(0x20)?),
            inode_bitmap: join_u64(read_u32_le(buf, 0x04, W)?, hi32(0x24)?),
            inode_table: join_u64(read_u32_le(buf, 0x08, W)?, hi32(0x28)?),
            free_blocks_count: u32::from(read_u16_le(buf, 0x0C, W)?) | hi16(0x2C)?,
            free_inodes_count: u32::from(read_u16_le(buf, 0x0E, W)?) | hi16(0x2E)?,
            used_dirs_count: u32::from(read_u16_le(buf, 0x10, W)?) | hi16(0x30)?,
            flags: read_u16_le(buf, 0x12, W)?,
        })
    }
}
