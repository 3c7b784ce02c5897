use crate::{BlockDevice, BlockError, checked_range};
use core::cell::RefCell;
use log::trace;

/// A block device backed by memory.
///
/// Devices built with [`new`](Self::new) reject writes; use
/// [`writable`](Self::writable) for a scratch disk.
pub struct RamDisk<S> {
    name: &'static str,
    data: RefCell<S>,
    writable: bool,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> RamDisk<S> {
    /// A read-only disk over `data`.
    pub const fn new(name: &'static str, data: S) -> Self {
        Self {
            name,
            data: RefCell::new(data),
            writable: false,
        }
    }

    /// A read-write disk over `data`.
    pub const fn writable(name: &'static str, data: S) -> Self {
        Self {
            name,
            data: RefCell::new(data),
            writable: true,
        }
    }

    /// Whether [`write`](BlockDevice::write) is permitted.
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Give back the backing storage.
    pub fn into_inner(self) -> S {
        self.data.into_inner()
    }

    fn len(&self) -> Result<u64, BlockError> {
        let data = self.data.try_borrow().map_err(|_| BlockError::Busy)?;
        u64::try_from(data.as_ref().len()).map_err(|_| BlockError::Io)
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> BlockDevice for RamDisk<S> {
    fn name(&self) -> &str {
        self.name
    }

    fn size(&self) -> u64 {
        self.len().unwrap_or(0)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let end = checked_range(self.len()?, offset, buf.len())?;
        trace!("{}: read {} bytes at {offset:#x}", self.name, buf.len());

        let data = self.data.try_borrow().map_err(|_| BlockError::Busy)?;
        let range = usize::try_from(offset).map_err(|_| BlockError::Io)?
            ..usize::try_from(end).map_err(|_| BlockError::Io)?;
        buf.copy_from_slice(&data.as_ref()[range]);
        Ok(())
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<(), BlockError> {
        if !self.writable {
            return Err(BlockError::ReadOnly);
        }
        let end = checked_range(self.len()?, offset, buf.len())?;
        trace!("{}: write {} bytes at {offset:#x}", self.name, buf.len());

        let mut data = self.data.try_borrow_mut().map_err(|_| BlockError::Busy)?;
        let range = usize::try_from(offset).map_err(|_| BlockError::Io)?
            ..usize::try_from(end).map_err(|_| BlockError::Io)?;
        data.as_mut()[range].copy_from_slice(buf);
        Ok(())
    }
}
