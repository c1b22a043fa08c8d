//! OBD-II Error Types

use crate::line::LinkState;
use thiserror::Error;

/// Errors that can occur during OBD-II communication
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObdError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Poll budget spent without seeing the expected byte
    #[error("Timeout while {phase} after {polls} polls")]
    Timeout { phase: LinkState, polls: u32 },

    /// Response did not fit the receive buffer
    #[error("Response exceeded {0} bytes without a terminator")]
    ResponseOverflow(usize),

    /// Adapter answered with its explicit no-data marker
    #[error("Adapter reported no data")]
    NoData,
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}
