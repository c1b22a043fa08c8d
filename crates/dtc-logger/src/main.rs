//! Trouble-Code Logger - Main Entry Point
//!
//! Usage: `dtc-logger [CONFIG.toml]`

use anyhow::{Context, Result};
use chrono::Utc;
use dtc_logger::{demo_transport, init_logging, run_cycle, AppConfig, Logs};
use nvm_storage::FileNvm;
use obd_protocol::{LineProtocol, SerialPortTransport, SerialTransport};
use obd_session::{LogReporter, Session};
use std::path::PathBuf;
use tracing::{error, info};

fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(config.log_level())?;

    info!("=== DTC Logger v{} ===", env!("CARGO_PKG_VERSION"));

    let mut logs = Logs::new(&config)?;
    config.check_nvm_fit(logs.region_len())?;

    let mut store = FileNvm::open(&config.nvm_path, config.nvm_size)
        .with_context(|| format!("opening NVM image {}", config.nvm_path.display()))?;
    logs.load(&store, config.nvm_start)
        .context("restoring fault logs")?;
    info!("Restored: {} | {}", logs.faults, logs.jumper);

    if config.demo {
        info!("Demo mode: using a scripted adapter");
        cycle(&config, &mut logs, &mut store, demo_transport(&config))
    } else {
        let transport = SerialPortTransport::open(&config.serial_device, config.baud_rate)
            .with_context(|| format!("opening {}", config.serial_device))?;
        cycle(&config, &mut logs, &mut store, transport)
    }
}

fn cycle<T: SerialTransport>(
    config: &AppConfig,
    logs: &mut Logs,
    store: &mut FileNvm,
    transport: T,
) -> Result<()> {
    let link = LineProtocol::new(transport, config.link.clone());
    let mut session = Session::new(link, LogReporter, config.session.clone());
    let now = u32::try_from(Utc::now().timestamp()).unwrap_or(0);

    let summary = run_cycle(
        logs,
        store,
        config.nvm_start,
        &mut session,
        now,
        config.cleared_lines,
    )
    .map_err(|e| {
        error!("Saving fault logs failed: {}", e);
        e
    })?;

    if config.json_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
