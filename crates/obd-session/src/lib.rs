//! OBD-II Fault Session
//!
//! Composes the adapter link, the response parser and the fault logs into
//! the device's use cases: poll active codes, poll jumper codes, and clear
//! codes. Rendering is delegated to a [`Reporter`].

mod reporter;
mod session;

pub use reporter::{LogReporter, Reporter, NO_CONNECTION};
pub use session::{PollReport, Session, SessionConfig};

use thiserror::Error;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Clock reading outside the plausible window; nothing was polled
    #[error("Timestamp {timestamp} outside valid range [{min}, {max}]")]
    TimestampOutOfRange { timestamp: u32, min: u32, max: u32 },
}
