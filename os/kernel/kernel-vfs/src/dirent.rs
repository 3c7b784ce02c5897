use crate::NodeType;
use core::fmt;

/// Maximum length of a single name component in bytes.
pub const NAME_MAX: usize = 255;

/// A directory entry as returned by [`VfsNode::readdir`](crate::VfsNode::readdir).
///
/// The name is stored inline; names longer than [`NAME_MAX`] are truncated.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_MAX],
    name_len: u8,
    inode: u32,
    node_type: NodeType,
}

impl DirEntry {
    #[must_use]
    pub fn new(inode: u32, node_type: NodeType, name: &[u8]) -> Self {
        let len = name.len().min(NAME_MAX);
        let mut buf = [0; NAME_MAX];
        buf[..len].copy_from_slice(&name[..len]);
        Self {
            name: buf,
            name_len: u8::try_from(len).unwrap_or(u8::MAX),
            inode,
            node_type,
        }
    }

    /// The raw name bytes.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name[..usize::from(self.name_len)]
    }

    /// The name, if it is valid UTF-8.
    #[must_use]
    pub fn name_str(&self) -> Option<&str> {
        core::str::from_utf8(self.name()).ok()
    }

    #[must_use]
    pub const fn inode(&self) -> u32 {
        self.inode
    }

    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.node_type
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DirEntry");
        match self.name_str() {
            Some(name) => s.field("name", &name),
            None => s.field("name", &self.name()),
        };
        s.field("inode", &self.inode)
            .field("node_type", &self.node_type)
            .finish()
    }
}
