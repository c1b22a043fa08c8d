//! Rendering collaborator

use std::time::Duration;
use tracing::{info, warn};

/// Shown when the adapter link is down
pub const NO_CONNECTION: &str = "No conn>";

/// Surface that shows status lines to the user.
///
/// The session only formats strings; a reporter decides where they go.
pub trait Reporter {
    /// Show one status line
    fn status(&mut self, line: &str);

    /// Tell the user the adapter is not answering
    fn no_connection(&mut self) {
        self.status(NO_CONNECTION);
    }

    /// Block up to `max_wait` for a manual acknowledgement. Returns whether
    /// one arrived.
    fn wait_for_ack(&mut self, _max_wait: Duration) -> bool {
        false
    }
}

/// Reporter that writes status lines to the log
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn status(&mut self, line: &str) {
        info!("{}", line);
    }

    fn no_connection(&mut self) {
        warn!("{}", NO_CONNECTION);
    }
}
