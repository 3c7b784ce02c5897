use kernel_block::{BlockDevice, BlockError, checked_range};
use log::{error, trace};
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A read-only block device over an image file.
pub struct FileDevice {
    name: String,
    file: RefCell<File>,
    size: u64,
}

impl FileDevice {
    /// Open the image at `path`.
    ///
    /// # Errors
    /// If the file cannot be opened or its size cannot be read.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            name: path.display().to_string(),
            file: RefCell::new(file),
            size,
        })
    }
}

impl BlockDevice for FileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        checked_range(self.size, offset, buf.len())?;
        trace!("{}: read {} bytes at {offset:#x}", self.name, buf.len());

        let mut file = self.file.try_borrow_mut().map_err(|_| BlockError::Busy)?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| {
                error!("{}: read at {offset:#x} failed: {e}", self.name);
                BlockError::Io
            })
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<(), BlockError> {
        Err(BlockError::ReadOnly)
    }
}
