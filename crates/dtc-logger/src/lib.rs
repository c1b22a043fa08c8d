//! Trouble-Code Logger
//!
//! Wires the non-volatile store, the fault logs and an adapter session into
//! one poll-and-persist cycle.

mod settings;

pub use settings::{verbosity_level, AppConfig, SettingsError};

use fault_log::{load_all, save_all, CodecError, FaultLog};
use nvm_storage::NvmStore;
use obd_protocol::{ScriptedTransport, SerialTransport};
use obd_session::{PollReport, Reporter, Session, SessionError};
use serde::Serialize;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging at `level`
pub fn init_logging(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// The fault log and the jumper log, in NVM order
pub struct Logs {
    pub faults: FaultLog,
    pub jumper: FaultLog,
}

impl Logs {
    /// Build both logs from configuration
    pub fn new(config: &AppConfig) -> Result<Self, fault_log::LogError> {
        Ok(Self {
            faults: FaultLog::new(config.faults.clone())?,
            jumper: FaultLog::new(config.jumper.clone())?,
        })
    }

    /// Bytes both regions take together
    pub fn region_len(&self) -> usize {
        self.faults.region_len() + self.jumper.region_len()
    }

    /// Restore both logs from `store` starting at `start`
    pub fn load<S: NvmStore>(&mut self, store: &S, start: usize) -> Result<usize, CodecError> {
        load_all(&mut [&mut self.faults, &mut self.jumper], store, start)
    }

    /// Persist both logs to `store` starting at `start`
    pub fn save<S: NvmStore>(&self, store: &mut S, start: usize) -> Result<usize, CodecError> {
        save_all(&[&self.faults, &self.jumper], store, start)
    }
}

/// What one cycle did
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub timestamp: u32,
    pub faults: PollReport,
    pub jumper: PollReport,
    pub active_faults: String,
    pub active_jumper: String,
    /// Offset just past the saved regions
    pub nvm_end: usize,
}

/// Poll active codes, then jumper codes, save both logs, and report.
///
/// A clock reading outside the session's window skips polling but the logs
/// are still saved and reported.
pub fn run_cycle<S, T, R>(
    logs: &mut Logs,
    store: &mut S,
    start: usize,
    session: &mut Session<T, R>,
    now: u32,
    cleared_lines: usize,
) -> Result<CycleSummary, CodecError>
where
    S: NvmStore,
    T: SerialTransport,
    R: Reporter,
{
    let faults = skip_on_bad_clock(session.poll_codes(&mut logs.faults, now));
    let jumper = skip_on_bad_clock(session.poll_jumper_codes(&mut logs.jumper, now));
    info!(
        "Cycle at {}: {} new fault codes, {} new jumper codes",
        now, faults.inserted, jumper.inserted
    );

    let nvm_end = logs.save(store, start)?;

    session.report(&logs.faults, cleared_lines);
    session.report(&logs.jumper, cleared_lines);

    Ok(CycleSummary {
        timestamp: now,
        faults,
        jumper,
        active_faults: logs.faults.active_summary(),
        active_jumper: logs.jumper.active_summary(),
        nvm_end,
    })
}

fn skip_on_bad_clock(result: Result<PollReport, SessionError>) -> PollReport {
    result.unwrap_or_else(|e| {
        warn!("Poll skipped: {}", e);
        PollReport::default()
    })
}

/// Adapter stand-in used when `demo` is set: reports two active codes and
/// one jumper code
pub fn demo_transport(config: &AppConfig) -> ScriptedTransport {
    let mut transport = ScriptedTransport::at_prompt();
    transport.push_reply(format!("{}\r43 02 0171 0420\r", config.session.codes_command));
    transport.push_reply(format!("{}\r", config.session.jumper_command));
    transport.push_reply("43 01 0300\r>");
    transport
}
