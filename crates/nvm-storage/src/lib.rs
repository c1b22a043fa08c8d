//! Non-Volatile Storage Layer
//!
//! Provides a flat, byte-addressed store that survives power loss, modelled
//! on EEPROM-style `get`/`put` access.

mod file;
mod memory;
mod store;

pub use file::FileNvm;
pub use memory::MemoryNvm;
pub use store::{NvmStore, NvmValue};

use thiserror::Error;

/// Value an erased cell reads back as
pub const ERASED_BYTE: u8 = 0xFF;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Access of {len} bytes at offset {offset} exceeds store size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("Backing file error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
