//! Half-duplex line protocol
//!
//! One request is in flight at a time. Every wait is a bounded poll loop:
//! at most `poll_limit` iterations per phase, sleeping `poll_delay` whenever
//! no byte is ready. A phase that runs out of polls marks the link as not
//! connected but never aborts the caller.

use crate::error::ObdError;
use crate::transport::SerialTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Adapter prompt, sent when it is ready for a command
pub const PROMPT: u8 = b'>';

/// End of a response line
pub const TERMINATOR: u8 = b'\r';

/// Configuration for the line protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Poll iterations allowed per phase
    pub poll_limit: u32,
    /// Sleep between polls that find no input (milliseconds)
    pub poll_delay_ms: u64,
    /// Settling delay around the steps of a two-line request (milliseconds)
    pub followup_delay_ms: u64,
    /// Largest response accepted before giving up on the line
    pub max_response_len: usize,
    /// Text the adapter sends when the vehicle has nothing to report
    pub no_data_marker: String,
    /// Appended to every transmitted line
    pub line_ending: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_limit: 100,
            poll_delay_ms: 150,
            followup_delay_ms: 500,
            max_response_len: 100,
            no_data_marker: "NODATA".to_string(),
            line_ending: "\r".to_string(),
        }
    }
}

impl LinkConfig {
    /// Defaults with every delay removed, for scripted links
    pub fn immediate() -> Self {
        Self {
            poll_delay_ms: 0,
            followup_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Sleep between idle polls
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    /// Settling delay for two-line requests
    pub fn followup_delay(&self) -> Duration {
        Duration::from_millis(self.followup_delay_ms)
    }

    /// Longest a single phase can block
    pub fn phase_budget(&self) -> Duration {
        self.poll_delay() * self.poll_limit
    }
}

/// Where the protocol is within a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    /// Discarding input up to a sentinel byte
    Flushing,
    Sending,
    /// Discarding the command echo up to its terminator
    AwaitingTerminator,
    /// Accumulating the response line
    Collecting,
    Done,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Flushing => "flushing to prompt",
            LinkState::Sending => "sending",
            LinkState::AwaitingTerminator => "awaiting terminator",
            LinkState::Collecting => "collecting response",
            LinkState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResponse {
    /// Collected response text, stripped of whitespace, nulls and prompts
    pub text: String,
    /// False if any phase timed out or the adapter reported no data
    pub connected: bool,
    /// First problem seen, if any
    pub failure: Option<ObdError>,
}

impl LinkResponse {
    fn new(text: String, failure: Option<ObdError>) -> Self {
        Self {
            text,
            connected: failure.is_none(),
            failure,
        }
    }
}

/// Bytes dropped silently while flushing or collecting
fn is_noise(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0
}

/// Keep the first failure of a request
fn note(failure: &mut Option<ObdError>, result: Result<(), ObdError>) {
    if let Err(e) = result {
        warn!("Link: {}", e);
        failure.get_or_insert(e);
    }
}

/// Request/response driver for a command-line adapter
pub struct LineProtocol<T: SerialTransport> {
    transport: T,
    config: LinkConfig,
    state: LinkState,
    /// Receive buffer, emptied at the start of every collect
    rx_buffer: Vec<u8>,
}

impl<T: SerialTransport> LineProtocol<T> {
    /// Create a protocol driver over `transport`
    pub fn new(transport: T, config: LinkConfig) -> Self {
        debug!(
            "Line protocol: {} polls x {:?} per phase",
            config.poll_limit,
            config.poll_delay()
        );
        let capacity = config.max_response_len;
        Self {
            transport,
            config,
            state: LinkState::Idle,
            rx_buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Protocol configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send `command` and return the adapter's one-line response.
    ///
    /// Flushes to the prompt, transmits, discards the echo up to its
    /// terminator, then collects the response line.
    pub fn request(&mut self, command: &str) -> LinkResponse {
        let mut failure = None;

        let flushed = self.flush_to(PROMPT, LinkState::Flushing);
        note(&mut failure, flushed);
        let sent = self.transmit(command);
        note(&mut failure, sent);
        let echoed = self.flush_to(TERMINATOR, LinkState::AwaitingTerminator);
        note(&mut failure, echoed);
        let collected = self.collect();
        note(&mut failure, collected);

        self.finish(failure)
    }

    /// Send `command`, then `value` on a second line, and return the
    /// response to the value.
    ///
    /// Used for configuration commands that prompt for a follow-up value.
    pub fn request_with_followup(&mut self, command: &str, value: &str) -> LinkResponse {
        let mut failure = None;

        self.settle();
        let sent = self.transmit(command);
        note(&mut failure, sent);
        self.settle();
        let echoed = self.flush_to(TERMINATOR, LinkState::AwaitingTerminator);
        note(&mut failure, echoed);
        self.settle();
        let sent = self.transmit(value);
        note(&mut failure, sent);
        self.settle();
        let collected = self.collect();
        note(&mut failure, collected);

        let response = self.finish(failure);
        self.settle();
        response
    }

    /// Wait for the prompt, then send `command` without collecting a reply.
    ///
    /// The command is sent even if the prompt never came. Returns whether the
    /// prompt was seen.
    pub fn send(&mut self, command: &str) -> bool {
        let mut failure = None;

        let flushed = self.flush_to(PROMPT, LinkState::Flushing);
        note(&mut failure, flushed);
        let sent = self.transmit(command);
        note(&mut failure, sent);

        self.state = LinkState::Done;
        failure.is_none()
    }

    /// Discard input until `sentinel` has been consumed
    fn flush_to(&mut self, sentinel: u8, phase: LinkState) -> Result<(), ObdError> {
        self.state = phase;

        for _ in 0..self.config.poll_limit {
            if self.transport.available() == 0 {
                self.pause();
                continue;
            }

            if self.transport.peek() == Some(sentinel) {
                self.transport.read();
                trace!("Rx: {:?};", sentinel as char);
                return Ok(());
            }

            if let Some(byte) = self.transport.read() {
                if !is_noise(byte) {
                    trace!("Rx discard: {:?}", byte as char);
                }
            }
        }

        Err(ObdError::Timeout {
            phase,
            polls: self.config.poll_limit,
        })
    }

    /// Accumulate a response line into the receive buffer
    fn collect(&mut self) -> Result<(), ObdError> {
        self.state = LinkState::Collecting;
        self.rx_buffer.clear();

        for _ in 0..self.config.poll_limit {
            if self.rx_buffer.len() >= self.config.max_response_len {
                return Err(ObdError::ResponseOverflow(self.config.max_response_len));
            }

            if self.transport.available() == 0 {
                self.pause();
                continue;
            }

            if self.transport.peek() == Some(TERMINATOR) {
                self.transport.read();
                return Ok(());
            }

            match self.transport.read() {
                Some(byte) if is_noise(byte) || byte == PROMPT => {}
                Some(byte) => {
                    trace!("Rx: {:?}", byte as char);
                    self.rx_buffer.push(byte);
                }
                None => {}
            }
        }

        Err(ObdError::Timeout {
            phase: LinkState::Collecting,
            polls: self.config.poll_limit,
        })
    }

    fn transmit(&mut self, text: &str) -> Result<(), ObdError> {
        self.state = LinkState::Sending;
        debug!("Tx: {}", text);
        self.transport
            .print(&format!("{}{}", text, self.config.line_ending))
    }

    /// Hand back the collected text and reset the buffer for the next call
    fn finish(&mut self, mut failure: Option<ObdError>) -> LinkResponse {
        let text = String::from_utf8_lossy(&self.rx_buffer).into_owned();
        self.rx_buffer.clear();
        self.state = LinkState::Done;

        if failure.is_none() && text.contains(self.config.no_data_marker.as_str()) {
            debug!("Adapter reported {}", self.config.no_data_marker);
            failure = Some(ObdError::NoData);
        }

        debug!("Rx response: {:?}", text);
        LinkResponse::new(text, failure)
    }

    fn pause(&self) {
        let delay = self.config.poll_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn settle(&self) {
        let delay = self.config.followup_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}
