/// File status, as reported by [`VfsNode::stat`](crate::VfsNode::stat).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    /// ID of the device containing the file.
    pub dev: u32,
    pub ino: u32,
    /// File type and permission bits.
    pub mode: u16,
    pub nlink: u16,
    pub uid: u32,
    pub gid: u32,
    /// Device ID, for special files.
    pub rdev: u32,
    /// Size in bytes.
    pub size: u64,
    /// Preferred I/O block size.
    pub blksize: u32,
    /// Number of 512-byte units allocated.
    pub blocks: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}
