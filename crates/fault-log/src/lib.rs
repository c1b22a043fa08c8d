//! Fault-Code Log
//!
//! Provides a fixed-capacity circular log of diagnostic trouble codes with
//! dedup-on-insert, oldest-first eviction, and a read-back verified
//! non-volatile persistence format.

mod codec;
mod record;
mod render;
mod ring;

pub use codec::{clear_all, load_all, save_all, CodecError, LoadOutcome};
pub use record::FaultRecord;
pub use render::{format_code, format_timestamp, NO_ACTIVE_CODES};
pub use ring::{FaultLog, LogConfig};

use thiserror::Error;

/// Lowest valid diagnostic code
pub const MIN_CODE: u32 = 1;

/// Highest valid diagnostic code
pub const MAX_CODE: u32 = 3499;

/// Whether `code` lies in the diagnostic code domain
pub fn is_valid_code(code: u32) -> bool {
    (MIN_CODE..=MAX_CODE).contains(&code)
}

/// Fault log errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// Capacity must be positive and fit the persisted `int32` field
    #[error("Invalid log capacity: {0}")]
    InvalidCapacity(usize),

    /// Raw slot access outside `0..capacity`
    #[error("Slot {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },
}
