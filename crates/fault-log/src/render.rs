//! Human-readable rendering of fault logs
//!
//! The log only formats strings here; putting them on a display is the
//! caller's job.

use crate::ring::FaultLog;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::fmt;
use tracing::warn;

/// Summary shown when a log has no active codes
pub const NO_ACTIVE_CODES: &str = "----  ";

/// Timestamp pattern for active code lines
const ACTIVE_TIME_FORMAT: &str = "%D-%H:%M";

/// Date pattern for cleared code entries
const CLEARED_DATE_FORMAT: &str = "%Y%m%d";

/// Render a code the way scan tools print powertrain codes, e.g. `P0420`
pub fn format_code(code: u32) -> String {
    format!("P{:04}", code)
}

/// Render epoch seconds in a fixed time zone `tz_offset_hours` east of UTC.
///
/// Offsets of a day or more are not representable and fall back to UTC.
pub fn format_timestamp(timestamp: u32, tz_offset_hours: i32, pattern: &str) -> String {
    let utc = DateTime::<Utc>::from_timestamp(i64::from(timestamp), 0).unwrap_or_default();
    let offset = tz_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            warn!("Time zone offset {}h out of range, using UTC", tz_offset_hours);
            Utc.fix()
        });
    utc.with_timezone(&offset).format(pattern).to_string()
}

impl FaultLog {
    /// Space-separated active codes, oldest first, or [`NO_ACTIVE_CODES`]
    pub fn active_summary(&self) -> String {
        let summary: String = self
            .iter()
            .filter(|r| r.active)
            .map(|r| format!("{} ", format_code(r.code)))
            .collect();

        if summary.is_empty() {
            NO_ACTIVE_CODES.to_string()
        } else {
            summary
        }
    }

    /// One `"<time> P0123"` line per active record, oldest first
    pub fn active_lines(&self) -> Vec<String> {
        self.iter()
            .filter(|r| r.active)
            .map(|r| {
                format!(
                    "{} {}",
                    format_timestamp(r.timestamp, self.timezone_offset(), ACTIVE_TIME_FORMAT),
                    format_code(r.code)
                )
            })
            .collect()
    }

    /// Up to `max` most recent cleared records, newest first, each rendered
    /// as a date line followed by an indented code line
    pub fn cleared_lines(&self, max: usize) -> Vec<String> {
        self.iter()
            .rev()
            .filter(|r| !r.active)
            .take(max)
            .map(|r| {
                format!(
                    "{}\n    {}\n",
                    format_timestamp(r.timestamp, self.timezone_offset(), CLEARED_DATE_FORMAT),
                    format_code(r.code)
                )
            })
            .collect()
    }
}

impl fmt::Display for FaultLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        for record in self.iter() {
            write!(
                f,
                " | {} {} {}",
                record.timestamp,
                format_code(record.code),
                u8::from(record.active)
            )?;
        }
        Ok(())
    }
}
