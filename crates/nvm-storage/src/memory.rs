//! In-memory store

use crate::store::check_bounds;
use crate::{NvmStore, StorageError, ERASED_BYTE};

/// Fixed-size byte image held in RAM, starting out erased
#[derive(Debug, Clone)]
pub struct MemoryNvm {
    bytes: Vec<u8>,
}

impl MemoryNvm {
    /// Create an erased store of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![ERASED_BYTE; size],
        }
    }

    /// Wrap an existing image
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the raw image
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl NvmStore for MemoryNvm {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        check_bounds(offset, data.len(), self.bytes.len())?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
