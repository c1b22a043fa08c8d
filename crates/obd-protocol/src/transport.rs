//! Serial transports
//!
//! A byte-oriented half-duplex channel: the line protocol polls for input,
//! peeks before consuming, and prints whole command lines.

use crate::error::ObdError;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info, warn};

/// Read timeout for the underlying port; polling never waits longer
const PORT_READ_TIMEOUT_MS: u64 = 10;

/// Byte channel to the adapter
pub trait SerialTransport {
    /// Number of bytes ready to read
    fn available(&mut self) -> usize;

    /// Next byte without consuming it
    fn peek(&mut self) -> Option<u8>;

    /// Consume the next byte
    fn read(&mut self) -> Option<u8>;

    /// Transmit `text` as-is
    fn print(&mut self, text: &str) -> Result<(), ObdError>;
}

/// Transport over a real serial device
pub struct SerialPortTransport {
    /// Device path (e.g., "/dev/ttyUSB0" or "COM3")
    device: String,
    port: Box<dyn SerialPort>,
    /// Bytes drained from the port but not yet consumed
    rx: VecDeque<u8>,
}

impl SerialPortTransport {
    /// Open `device` at `baud_rate`
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, ObdError> {
        info!("Opening serial device {} at {} baud", device, baud_rate);
        let port = tokio_serial::new(device, baud_rate)
            .timeout(Duration::from_millis(PORT_READ_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            device: device.to_string(),
            port,
            rx: VecDeque::new(),
        })
    }

    /// Device path
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Move whatever the port has buffered into `rx`
    fn fill(&mut self) {
        let pending = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("{}: cannot query input: {}", self.device, e);
                return;
            }
        };
        if pending == 0 {
            return;
        }

        let mut buf = vec![0u8; pending];
        match self.port.read(&mut buf) {
            Ok(n) => self.rx.extend(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => warn!("{}: read failed: {}", self.device, e),
        }
    }
}

impl SerialTransport for SerialPortTransport {
    fn available(&mut self) -> usize {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.len()
    }

    fn peek(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.front().copied()
    }

    fn read(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.pop_front()
    }

    fn print(&mut self, text: &str) -> Result<(), ObdError> {
        self.port.write_all(text.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }
}

/// In-process adapter stand-in that replays canned replies.
///
/// Each printed line releases the next queued reply into the receive
/// stream. Everything printed is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    rx: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    sent: Vec<String>,
}

impl ScriptedTransport {
    /// Transport with nothing to say
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose adapter is sitting at its `>` prompt
    pub fn at_prompt() -> Self {
        let mut transport = Self::new();
        transport.inject(b">");
        transport
    }

    /// Make `bytes` readable immediately
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Queue a reply to be released by the next printed line
    pub fn push_reply(&mut self, reply: impl AsRef<[u8]>) {
        self.replies.push_back(reply.as_ref().to_vec());
    }

    /// Queue what an echoing adapter sends back for `command`: the echo, the
    /// response line, and a fresh prompt
    pub fn push_echoed_reply(&mut self, command: &str, response: &str) {
        self.push_reply(format!("{}\r{}\r\r>", command, response));
    }

    /// Everything printed so far
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Bytes still waiting to be read
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl SerialTransport for ScriptedTransport {
    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn peek(&mut self) -> Option<u8> {
        self.rx.front().copied()
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn print(&mut self, text: &str) -> Result<(), ObdError> {
        debug!("Scripted adapter received {:?}", text);
        self.sent.push(text.to_string());
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reply_released_on_print() {
        let mut transport = ScriptedTransport::at_prompt();
        transport.push_reply(b"OK\r");
        assert_eq!(transport.available(), 1);

        transport.print("ATZ\r").unwrap();
        assert_eq!(transport.sent(), ["ATZ\r".to_string()]);
        assert_eq!(transport.available(), 4);
        assert_eq!(transport.peek(), Some(b'>'));
        assert_eq!(transport.read(), Some(b'>'));
        assert_eq!(transport.read(), Some(b'O'));
    }

    #[test]
    fn test_scripted_without_replies_stays_silent() {
        let mut transport = ScriptedTransport::new();
        transport.print("03\r").unwrap();
        assert_eq!(transport.available(), 0);
        assert_eq!(transport.peek(), None);
        assert_eq!(transport.read(), None);
    }
}
