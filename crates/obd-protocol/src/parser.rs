//! Trouble-code response decoding
//!
//! Response layout (ASCII, whitespace already stripped):
//!
//! ```text
//! offset 0..2   mode echo (ignored)
//! offset 2..4   decimal count of codes that follow
//! offset 4..    count x 4-digit decimal codes
//! ```

use tracing::{debug, warn};

/// Shortest response that can carry a code
pub const MIN_RESPONSE_LEN: usize = 8;

/// Most codes a single response may declare
pub const MAX_CODES: usize = 100;

const COUNT_FIELD: std::ops::Range<usize> = 2..4;
const CODES_START: usize = 4;
const CODE_WIDTH: usize = 4;

/// Decoder for the adapter's trouble-code response
pub struct ResponseParser;

impl ResponseParser {
    /// Decode `raw` into codes in adapter order.
    ///
    /// Short or inconsistent responses yield an empty list. Individual fields
    /// outside the code domain (1..=3499) are dropped; their siblings are kept.
    pub fn decode(raw: &str) -> Vec<u32> {
        let bytes = raw.as_bytes();
        if bytes.len() < MIN_RESPONSE_LEN {
            debug!("Response too short ({} bytes): {:?}", bytes.len(), raw);
            return Vec::new();
        }

        let Some(declared) = Self::field(bytes, COUNT_FIELD) else {
            warn!("Unreadable code count in {:?}", raw);
            return Vec::new();
        };
        let declared = declared as usize;
        if declared > MAX_CODES || declared * CODE_WIDTH > bytes.len() - CODES_START {
            warn!("Response declares {} codes but carries {} bytes", declared, bytes.len());
            return Vec::new();
        }

        let mut codes = Vec::with_capacity(declared);
        let mut remaining = declared as i64;
        for i in 0..declared {
            let start = CODES_START + i * CODE_WIDTH;
            match Self::field(bytes, start..start + CODE_WIDTH) {
                Some(code) if fault_domain(code) => codes.push(code),
                other => {
                    remaining -= 1;
                    warn!(
                        "Rejecting bad code {:?} ({} of {} usable)",
                        other, remaining, declared
                    );
                }
            }
        }

        debug!("Decoded {} codes: {:?}", codes.len(), codes);
        codes
    }

    /// Parse a decimal field, or `None` unless every byte is a digit; a field
    /// with a digit prefix such as "12AB" is rejected whole
    fn field(bytes: &[u8], range: std::ops::Range<usize>) -> Option<u32> {
        let digits = bytes.get(range)?;
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(digits).ok()?.parse().ok()
    }
}

fn fault_domain(code: u32) -> bool {
    code > 0 && code < 3500
}
