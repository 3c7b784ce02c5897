//! Linear directory blocks.

use kernel_vfs::NodeType;

/// Fixed part of a directory record: inode, `rec_len`, `name_len`, file type.
pub const DIR_ENTRY_HEADER: usize = 8;

/// One record of a directory block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawDirEntry<'a> {
    /// Target inode; `0` marks an unused record.
    pub inode: u32,
    pub rec_len: u16,
    pub file_type: u8,
    pub name: &'a [u8],
}

impl RawDirEntry<'_> {
    /// Whether the record names a live inode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.inode != 0
    }

    /// The node type recorded in the entry.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        node_type_from_file_type(self.file_type)
    }
}

/// Map an on-disk directory file type to a node type; unknown types
/// read as regular files.
#[must_use]
pub const fn node_type_from_file_type(file_type: u8) -> NodeType {
    match file_type {
        2 => NodeType::Directory,
        3 => NodeType::CharDevice,
        4 => NodeType::BlockDevice,
        5 => NodeType::Pipe,
        6 => NodeType::Socket,
        7 => NodeType::Symlink,
        _ => NodeType::File,
    }
}

/// Iterator over the records of one directory block.
///
/// Iteration ends at the block end, at a record with `rec_len == 0` and at
/// any record whose length or name would overrun the block.
pub struct DirBlock<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> DirBlock<'a> {
    #[must_use]
    pub const fn new(block: &'a [u8]) -> Self {
        Self { block, offset: 0 }
    }
}

impl<'a> Iterator for DirBlock<'a> {
    type Item = RawDirEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.block.get(self.offset..)?;
        let header: &[u8; DIR_ENTRY_HEADER] = rest.get(..DIR_ENTRY_HEADER)?.try_into().ok()?;

        let inode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let rec_len = u16::from_le_bytes([header[4], header[5]]);
        let name_len = usize::from(header[6]);
        let file_type = header[7];

        let record = usize::from(rec_len);
        if record < DIR_ENTRY_HEADER
            || record > rest.len()
            || DIR_ENTRY_HEADER + name_len > record
        {
            // rec_len == 0 lands here too
            self.offset = self.block.len();
            return None;
        }

        self.offset += record;
        Some(RawDirEntry {
            inode,
            rec_len,
            file_type,
            name: &rest[DIR_ENTRY_HEADER..DIR_ENTRY_HEADER + name_len],
        })
    }
}

impl core::iter::FusedIterator for DirBlock<'_> {}
