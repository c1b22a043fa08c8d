//! Session Implementation

use crate::reporter::Reporter;
use crate::SessionError;
use fault_log::{format_code, FaultLog};
use obd_protocol::{mode, LineProtocol, LinkResponse, ObdError, ResponseParser, SerialTransport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for a fault session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Command requesting active trouble codes
    pub codes_command: String,
    /// Command clearing trouble codes
    pub clear_command: String,
    /// Adapter command that is followed by a value line to read jumper codes
    pub jumper_command: String,
    /// Value line sent after `jumper_command`
    pub jumper_value: String,
    /// Decode jumper codes but do not log them
    pub ignore_jumper_codes: bool,
    /// How long to wait for a manual acknowledgement after a lost link (ms)
    pub ack_wait_ms: u64,
    /// Earliest plausible clock reading (epoch seconds)
    pub min_timestamp: u32,
    /// Latest plausible clock reading (epoch seconds)
    pub max_timestamp: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            codes_command: mode::command(mode::READ_DTC),
            clear_command: mode::command(mode::CLEAR_DTC),
            jumper_command: "ATJMP".to_string(),
            jumper_value: "1".to_string(),
            ignore_jumper_codes: false,
            ack_wait_ms: 5000,
            // 2016-02-03
            min_timestamp: 1_454_540_170,
            // 2100-01-01
            max_timestamp: 4_102_444_800,
        }
    }
}

impl SessionConfig {
    /// Acknowledgement wait as a duration
    pub fn ack_wait(&self) -> Duration {
        Duration::from_millis(self.ack_wait_ms)
    }
}

/// Result of one poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// Whether the adapter answered with usable data
    pub connected: bool,
    /// Codes decoded from the response, in adapter order
    pub codes: Vec<u32>,
    /// How many of them were new to the log
    pub inserted: usize,
}

/// Drives the adapter and records what it reports
pub struct Session<T: SerialTransport, R: Reporter> {
    link: LineProtocol<T>,
    reporter: R,
    config: SessionConfig,
}

impl<T: SerialTransport, R: Reporter> Session<T, R> {
    /// Create a session over an adapter link
    pub fn new(link: LineProtocol<T>, reporter: R, config: SessionConfig) -> Self {
        info!(
            "Session created (codes {:?}, clear {:?}, jumper {:?})",
            config.codes_command, config.clear_command, config.jumper_command
        );
        Self {
            link,
            reporter,
            config,
        }
    }

    /// Adapter link
    pub fn link(&self) -> &LineProtocol<T> {
        &self.link
    }

    /// Rendering collaborator
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Mutable rendering collaborator
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Request active codes and record each one in `log` at time `now`
    pub fn poll_codes(&mut self, log: &mut FaultLog, now: u32) -> Result<PollReport, SessionError> {
        self.check_timestamp(now)?;

        let command = self.config.codes_command.clone();
        let response = self.link.request(&command);
        if !self.accept(&response) {
            return Ok(PollReport::default());
        }

        let codes = ResponseParser::decode(&response.text);
        let inserted = self.record_all(log, now, &codes, true);
        Ok(PollReport {
            connected: true,
            codes,
            inserted,
        })
    }

    /// Request jumper codes through the two-line command and record them in
    /// `log` unless configured to ignore them
    pub fn poll_jumper_codes(
        &mut self,
        log: &mut FaultLog,
        now: u32,
    ) -> Result<PollReport, SessionError> {
        self.check_timestamp(now)?;

        let command = self.config.jumper_command.clone();
        let value = self.config.jumper_value.clone();
        let response = self.link.request_with_followup(&command, &value);
        if !self.accept(&response) {
            return Ok(PollReport::default());
        }

        let codes = ResponseParser::decode(&response.text);
        let keep = !self.config.ignore_jumper_codes;
        if !keep {
            debug!("Ignoring {} jumper codes", codes.len());
        }
        let inserted = self.record_all(log, now, &codes, keep);
        Ok(PollReport {
            connected: true,
            codes,
            inserted,
        })
    }

    /// Send the clear command; if the adapter was ready, mark every record
    /// in `log` cleared. Returns whether the clear was sent to a ready
    /// adapter.
    pub fn clear_codes(&mut self, log: &mut FaultLog) -> bool {
        let command = self.config.clear_command.clone();
        if !self.link.send(&command) {
            self.lost_link();
            return false;
        }

        log.mark_all_cleared();
        info!("{}: codes cleared", log.name());
        true
    }

    /// Hand `log`'s active summary and recent cleared codes to the reporter
    pub fn report(&mut self, log: &FaultLog, cleared: usize) {
        self.reporter
            .status(&format!("{}: {}", log.name(), log.active_summary()));
        for line in log.active_lines() {
            self.reporter.status(&line);
        }
        for line in log.cleared_lines(cleared) {
            self.reporter.status(&line);
        }
    }

    fn check_timestamp(&self, now: u32) -> Result<(), SessionError> {
        if now < self.config.min_timestamp || now > self.config.max_timestamp {
            warn!("Bad time = {}", now);
            return Err(SessionError::TimestampOutOfRange {
                timestamp: now,
                min: self.config.min_timestamp,
                max: self.config.max_timestamp,
            });
        }
        Ok(())
    }

    /// Whether a response carries data worth decoding. A link failure is
    /// surfaced to the user; an explicit no-data reply is not.
    fn accept(&mut self, response: &LinkResponse) -> bool {
        match &response.failure {
            None => true,
            Some(ObdError::NoData) => {
                debug!("Adapter has no data");
                false
            }
            Some(e) => {
                warn!("Adapter not connected: {}", e);
                self.lost_link();
                false
            }
        }
    }

    fn lost_link(&mut self) {
        self.reporter.no_connection();
        if self.reporter.wait_for_ack(self.config.ack_wait()) {
            debug!("Lost link acknowledged");
        }
    }

    fn record_all(&mut self, log: &mut FaultLog, now: u32, codes: &[u32], keep: bool) -> usize {
        let mut inserted = 0;
        for &code in codes {
            self.reporter.status(&format_code(code));
            if keep && log.record(now, code) {
                inserted += 1;
            }
        }
        inserted
    }
}
