//! File-backed store
//!
//! Emulates an EEPROM part with a fixed-size image file. Reads come from the
//! file itself so a read-back sees what actually landed; every write is
//! synced before returning.

use crate::store::check_bounds;
use crate::{NvmStore, StorageError, ERASED_BYTE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Non-volatile store persisted to a file
#[derive(Debug)]
pub struct FileNvm {
    path: PathBuf,
    file: File,
    size: usize,
}

impl FileNvm {
    /// Open (or create) an image of exactly `size` bytes at `path`.
    ///
    /// A missing file is created erased. A short file is padded with erased
    /// bytes; a long file is only addressed up to `size`.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let existing = file.metadata()?.len() as usize;
        if existing < size {
            debug!(
                "Padding NVM image {} from {} to {} bytes",
                path.display(),
                existing,
                size
            );
            file.seek(SeekFrom::Start(existing as u64))?;
            file.write_all(&vec![ERASED_BYTE; size - existing])?;
            file.sync_data()?;
        }

        info!("Opened NVM image {} ({} bytes)", path.display(), size);
        Ok(Self { path, file, size })
    }

    /// Path of the backing image
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NvmStore for FileNvm {
    fn len(&self) -> usize {
        self.size
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(offset, buf.len(), self.size)?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        check_bounds(offset, data.len(), self.size)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        Ok(())
    }
}
