//! OBD-II Adapter Protocol
//!
//! This crate drives a half-duplex, line-oriented serial link to a
//! command-line OBD-II adapter and decodes its trouble-code responses. All
//! waiting is bounded busy-polling; there is no async path.

mod error;
mod line;
mod parser;
mod transport;

pub use error::ObdError;
pub use line::{LineProtocol, LinkConfig, LinkResponse, LinkState, PROMPT, TERMINATOR};
pub use parser::{ResponseParser, MAX_CODES, MIN_RESPONSE_LEN};
pub use transport::{ScriptedTransport, SerialPortTransport, SerialTransport};

/// OBD-II mode constants
pub mod mode {
    /// Stored (confirmed) diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Clear trouble codes
    pub const CLEAR_DTC: u8 = 0x04;
    /// Pending diagnostic trouble codes
    pub const PENDING_DTC: u8 = 0x07;

    /// Adapter command text for a mode request, e.g. `"03"`
    pub fn command(mode: u8) -> String {
        format!("{:02X}", mode)
    }
}
