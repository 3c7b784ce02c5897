//! # Virtual Filesystem Interface
//!
//! The contract between filesystems and the rest of the kernel. A
//! filesystem exposes its files as nodes implementing [`VfsNode`]; callers
//! resolve paths with [`lookup`] and read through the node. Mount tables,
//! file descriptors and seek offsets are layered on top by the kernel and
//! are not part of this crate.
//!
//! ## Records
//!
//! * [`NodeType`]: what a node is, with the kernel ABI's numeric codes.
//! * [`NodeMetadata`]: type, size and ownership captured at node creation.
//! * [`DirEntry`]: one directory entry with an inline name of up to
//!   [`NAME_MAX`] bytes.
//! * [`Stat`]: file status as returned to user space.
//! * [`OpenFlags`]: the open request bits.
//!
//! ## Paths
//!
//! [`normalize`] turns a path into components without allocating; [`lookup`]
//! walks those components with [`VfsNode::finddir`].

#![cfg_attr(not(any(test, doctest)), no_std)]

mod dirent;
mod flags;
mod node;
mod path;
mod stat;

pub use dirent::{DirEntry, NAME_MAX};
pub use flags::{AccessMode, OpenFlags};
pub use node::{ReadDir, VfsNode};
pub use path::{LookupError, MAX_COMPONENTS, NormalizedPath, PATH_MAX, PathError, lookup, normalize};
pub use stat::Stat;

/// File type bits of a mode word.
pub const S_IFMT: u16 = 0o170_000;
pub const S_IFSOCK: u16 = 0o140_000;
pub const S_IFLNK: u16 = 0o120_000;
pub const S_IFREG: u16 = 0o100_000;
pub const S_IFBLK: u16 = 0o060_000;
pub const S_IFDIR: u16 = 0o040_000;
pub const S_IFCHR: u16 = 0o020_000;
pub const S_IFIFO: u16 = 0o010_000;

/// Kind of a filesystem node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    File = 0x01,
    Directory = 0x02,
    CharDevice = 0x03,
    BlockDevice = 0x04,
    Pipe = 0x05,
    Symlink = 0x06,
    MountPoint = 0x08,
    Socket = 0x09,
}

impl NodeType {
    /// Node type from the file type bits of a POSIX mode word.
    ///
    /// Unknown types are reported as regular files.
    #[must_use]
    pub const fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            S_IFCHR => Self::CharDevice,
            S_IFBLK => Self::BlockDevice,
            S_IFIFO => Self::Pipe,
            S_IFSOCK => Self::Socket,
            _ => Self::File,
        }
    }

    /// The numeric code used by the kernel ABI.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Node attributes captured when the node was created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub inode: u32,
    pub node_type: NodeType,
    /// Permission bits (the low 12 bits of the mode word).
    pub permissions: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub links: u16,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}
