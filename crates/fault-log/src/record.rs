//! Fault record stored in each log slot

use nvm_storage::NvmValue;
use serde::{Deserialize, Serialize};

/// A timestamped fault-code entry.
///
/// Identity is `(timestamp, code)`; the `active` flag is not compared, so a
/// cleared record still equals its active original.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FaultRecord {
    /// Epoch seconds when the code was first seen
    pub timestamp: u32,
    /// Diagnostic trouble code
    pub code: u32,
    /// False once the record has been cleared; kept for history
    pub active: bool,
}

impl FaultRecord {
    /// Zero-valued, inactive record used for empty slots and empty peeks
    pub const EMPTY: FaultRecord = FaultRecord {
        timestamp: 0,
        code: 0,
        active: false,
    };

    /// Create a new active record
    pub fn new(timestamp: u32, code: u32) -> Self {
        Self {
            timestamp,
            code,
            active: true,
        }
    }

    /// Compare every field, including `active`
    pub fn same_contents(&self, other: &FaultRecord) -> bool {
        self == other && self.active == other.active
    }
}

impl PartialEq for FaultRecord {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.code == other.code
    }
}

impl Eq for FaultRecord {}

impl NvmValue for FaultRecord {
    const SIZE: usize = <u32 as NvmValue>::SIZE * 2 + <bool as NvmValue>::SIZE;

    fn encode(&self, out: &mut [u8]) {
        self.timestamp.encode(&mut out[0..4]);
        self.code.encode(&mut out[4..8]);
        self.active.encode(&mut out[8..9]);
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            timestamp: u32::decode(&bytes[0..4]),
            code: u32::decode(&bytes[4..8]),
            active: bool::decode(&bytes[8..9]),
        }
    }
}
