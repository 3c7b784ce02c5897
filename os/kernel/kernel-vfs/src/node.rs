use crate::{DirEntry, NodeMetadata, OpenFlags, Stat};
use core::iter::FusedIterator;

/// Operations every filesystem node provides.
///
/// A node is a cheap handle bound to its filesystem (typically a borrow of
/// the mounted filesystem plus a copy of the on-disk inode). Looking up a
/// child yields a fresh node; dropping a node releases nothing on disk.
pub trait VfsNode: Sized {
    type Error;

    /// Type, size and ownership of the node, as captured when it was created.
    fn metadata(&self) -> NodeMetadata;

    /// # Errors
    /// Filesystem specific.
    fn open(&self, flags: OpenFlags) -> Result<(), Self::Error>;

    /// # Errors
    /// Filesystem specific.
    fn close(&self) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes at `offset`; returns the number of bytes
    /// read, `0` at or past the end of the file.
    ///
    /// # Errors
    /// Filesystem specific.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `buf` at `offset`; returns the number of bytes written.
    ///
    /// # Errors
    /// Filesystem specific.
    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, Self::Error>;

    /// The `index`-th entry of a directory, `None` past the last one.
    ///
    /// # Errors
    /// Filesystem specific; calling this on a non-directory is an error.
    fn readdir(&self, index: u32) -> Result<Option<DirEntry>, Self::Error>;

    /// The child called `name`, `None` if there is none.
    ///
    /// # Errors
    /// Filesystem specific; calling this on a non-directory is an error.
    fn finddir(&self, name: &[u8]) -> Result<Option<Self>, Self::Error>;

    /// # Errors
    /// Filesystem specific.
    fn stat(&self) -> Result<Stat, Self::Error>;

    /// Iterate over all directory entries in order.
    fn entries(&self) -> ReadDir<'_, Self> {
        ReadDir {
            node: self,
            index: 0,
            done: false,
        }
    }
}

/// Iterator returned by [`VfsNode::entries`].
///
/// Stops after the last entry or after the first error.
pub struct ReadDir<'n, N> {
    node: &'n N,
    index: u32,
    done: bool,
}

impl<N: VfsNode> Iterator for ReadDir<'_, N> {
    type Item = Result<DirEntry, N::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.node.readdir(self.index) {
            Ok(Some(entry)) => {
                self.index = self.index.saturating_add(1);
                Some(Ok(entry))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<N: VfsNode> FusedIterator for ReadDir<'_, N> {}
