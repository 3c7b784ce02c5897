//! # Block Devices
//!
//! Byte-addressed access to storage. Filesystems see a device only through
//! the [`BlockDevice`] trait; where the bytes come from (a virtio disk, an
//! image file on the host, memory) is the driver's business.
//!
//! [`RamDisk`] is the in-memory driver. It backs boot-time images and the
//! filesystem test suites.
//!
//! ```rust
//! use kernel_block::{BlockDevice, BlockError, RamDisk};
//!
//! let disk = RamDisk::new("ram0", vec![0xAB; 4096]);
//! let mut buf = [0u8; 16];
//! disk.read(1024, &mut buf).unwrap();
//! assert_eq!(buf, [0xAB; 16]);
//!
//! assert_eq!(disk.write(0, &buf), Err(BlockError::ReadOnly));
//! assert!(matches!(disk.read(4090, &mut buf), Err(BlockError::OutOfRange { .. })));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod ram_disk;

pub use ram_disk::RamDisk;

/// Byte-addressed storage.
///
/// Offsets and lengths are in bytes; drivers with a native sector size
/// handle the sub-sector arithmetic themselves.
pub trait BlockDevice {
    /// Device name for diagnostics.
    fn name(&self) -> &str;

    /// Device size in bytes.
    fn size(&self) -> u64;

    /// Fill `buf` from the device starting at byte `offset`.
    ///
    /// # Errors
    /// [`BlockError::OutOfRange`] if the range exceeds the device, or a
    /// driver-specific failure.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), BlockError>;

    /// Write `buf` to the device starting at byte `offset`.
    ///
    /// # Errors
    /// [`BlockError::ReadOnly`] for read-only devices, otherwise as
    /// [`read`](Self::read).
    fn write(&self, offset: u64, buf: &[u8]) -> Result<(), BlockError>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        (**self).read(offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<(), BlockError> {
        (**self).write(offset, buf)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("access of {len} bytes at offset {offset:#x} is beyond the device end")]
    OutOfRange { offset: u64, len: usize },
    #[error("device is read-only")]
    ReadOnly,
    #[error("device is busy")]
    Busy,
    #[error("device I/O failure")]
    Io,
}

/// Check that `len` bytes at `offset` fit a device of `size` bytes and
/// return the end offset.
///
/// # Errors
/// [`BlockError::OutOfRange`] otherwise.
pub fn checked_range(size: u64, offset: u64, len: usize) -> Result<u64, BlockError> {
    u64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .filter(|&end| end <= size)
        .ok_or(BlockError::OutOfRange { offset, len })
}
