//! End-to-end poll-and-persist cycles against a scripted adapter

use dtc_logger::{demo_transport, run_cycle, AppConfig, Logs};
use fault_log::CodecError;
use nvm_storage::{FileNvm, MemoryNvm, NvmStore, StorageError};
use obd_protocol::{LineProtocol, LinkConfig, ScriptedTransport};
use obd_session::{LogReporter, Session};

const NOW: u32 = 1_700_000_000;

fn config() -> AppConfig {
    AppConfig {
        link: LinkConfig::immediate(),
        demo: true,
        ..Default::default()
    }
}

fn session(config: &AppConfig, transport: ScriptedTransport) -> Session<ScriptedTransport, LogReporter> {
    Session::new(
        LineProtocol::new(transport, config.link.clone()),
        LogReporter,
        config.session.clone(),
    )
}

#[test]
fn test_demo_cycle_records_and_persists() {
    let config = config();
    let mut logs = Logs::new(&config).unwrap();
    let mut store = MemoryNvm::new(config.nvm_size);
    let mut session = session(&config, demo_transport(&config));

    let summary = run_cycle(&mut logs, &mut store, 0, &mut session, NOW, 3).unwrap();
    assert_eq!(summary.faults.codes, vec![171, 420]);
    assert_eq!(summary.jumper.codes, vec![300]);
    assert_eq!(summary.active_faults, "P0171 P0420 ");
    assert_eq!(summary.active_jumper, "P0300 ");
    assert_eq!(summary.nvm_end, logs.region_len());

    let mut restored = Logs::new(&config).unwrap();
    restored.load(&store, 0).unwrap();
    assert_eq!(restored.faults.active_summary(), "P0171 P0420 ");
    assert_eq!(restored.jumper.active_summary(), "P0300 ");
}

#[test]
fn test_silent_adapter_still_saves() {
    let config = config();
    let mut logs = Logs::new(&config).unwrap();
    logs.faults.record(NOW - 100, 55);
    let mut store = MemoryNvm::new(config.nvm_size);
    let mut session = session(&config, ScriptedTransport::new());

    let summary = run_cycle(&mut logs, &mut store, 16, &mut session, NOW, 3).unwrap();
    assert!(!summary.faults.connected);
    assert!(!summary.jumper.connected);
    assert_eq!(summary.nvm_end, 16 + logs.region_len());

    let mut restored = Logs::new(&config).unwrap();
    restored.load(&store, 16).unwrap();
    assert_eq!(restored.faults.active_summary(), "P0055 ");
    assert!(restored.jumper.is_empty());
}

#[test]
fn test_bad_clock_skips_polling() {
    let config = config();
    let mut logs = Logs::new(&config).unwrap();
    let mut store = MemoryNvm::new(config.nvm_size);
    let mut session = session(&config, demo_transport(&config));

    let summary = run_cycle(&mut logs, &mut store, 0, &mut session, 12, 3).unwrap();
    assert!(summary.faults.codes.is_empty());
    assert!(logs.faults.is_empty());
    assert!(session.link().transport().sent().is_empty());
}

#[test]
fn test_store_too_small_fails_save() {
    let config = config();
    let mut logs = Logs::new(&config).unwrap();
    let mut store = MemoryNvm::new(64);
    let mut session = session(&config, ScriptedTransport::new());

    let err = run_cycle(&mut logs, &mut store, 0, &mut session, NOW, 3).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Storage(StorageError::OutOfBounds { .. })
    ));
    assert!(config.check_nvm_fit(logs.region_len()).is_ok());
    assert!(AppConfig { nvm_size: 64, ..config }
        .check_nvm_fit(logs.region_len())
        .is_err());
}

#[test]
fn test_file_image_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dtc.nvm");
    let config = config();

    {
        let mut store = FileNvm::open(&path, config.nvm_size).unwrap();
        let mut logs = Logs::new(&config).unwrap();
        let mut session = session(&config, demo_transport(&config));
        run_cycle(&mut logs, &mut store, 0, &mut session, NOW, 3).unwrap();
    }

    let store = FileNvm::open(&path, config.nvm_size).unwrap();
    assert_eq!(store.len(), config.nvm_size);
    let mut logs = Logs::new(&config).unwrap();
    logs.load(&store, 0).unwrap();
    assert_eq!(logs.faults.occupied_count(), 2);
    assert_eq!(logs.jumper.peek_newest().code, 300);
    assert_eq!(logs.jumper.peek_newest().timestamp, NOW);
}
