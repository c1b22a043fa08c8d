//! Application configuration

use config::{Config, ConfigError, Environment, File};
use fault_log::LogConfig;
use obd_protocol::LinkConfig;
use obd_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

/// Prefix for environment overrides, e.g. `DTC_SERIAL_DEVICE`
const ENV_PREFIX: &str = "DTC";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Load(#[from] ConfigError),

    #[error("NVM image of {size} bytes cannot hold {needed} bytes of logs")]
    NvmTooSmall { needed: usize, size: usize },
}

/// Everything the logger can be told
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Adapter serial device
    pub serial_device: String,
    pub baud_rate: u32,
    /// Talk to a scripted adapter instead of `serial_device`
    pub demo: bool,
    /// File holding the NVM image
    pub nvm_path: PathBuf,
    /// Size of the NVM image in bytes
    pub nvm_size: usize,
    /// Offset of the first log region
    pub nvm_start: usize,
    /// 0 (errors only) through 6 (everything)
    pub verbosity: u8,
    /// Number of cleared codes shown after a cycle
    pub cleared_lines: usize,
    /// Print the cycle summary as JSON on stdout
    pub json_summary: bool,
    pub faults: LogConfig,
    pub jumper: LogConfig,
    pub link: LinkConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial_device: "/dev/ttyUSB0".to_string(),
            baud_rate: 38_400,
            demo: false,
            nvm_path: PathBuf::from("dtc-logger.nvm"),
            nvm_size: 1024,
            nvm_start: 0,
            verbosity: 3,
            cleared_lines: 3,
            json_summary: false,
            faults: LogConfig::default(),
            jumper: LogConfig {
                name: "jumper".to_string(),
                ..Default::default()
            },
            link: LinkConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then `DTC_*` environment
    /// variables (`__` separates nested keys, e.g. `DTC_LINK__POLL_LIMIT`)
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Tracing level for the configured verbosity
    pub fn log_level(&self) -> Level {
        verbosity_level(self.verbosity)
    }

    /// Reject an image too small for both log regions
    pub fn check_nvm_fit(&self, needed: usize) -> Result<(), SettingsError> {
        let needed = self.nvm_start + needed;
        if needed > self.nvm_size {
            return Err(SettingsError::NvmTooSmall {
                needed,
                size: self.nvm_size,
            });
        }
        Ok(())
    }
}

/// Map a numeric verbosity onto a tracing level
pub fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1..=2 => Level::WARN,
        3 => Level::INFO,
        4..=5 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_level(0), Level::ERROR);
        assert_eq!(verbosity_level(2), Level::WARN);
        assert_eq!(verbosity_level(3), Level::INFO);
        assert_eq!(verbosity_level(5), Level::DEBUG);
        assert_eq!(verbosity_level(9), Level::TRACE);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.faults.name, "faults");
        assert_eq!(config.jumper.name, "jumper");
        assert_eq!(config.faults.capacity, 20);
        assert_eq!(config.log_level(), Level::INFO);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
serial_device = "/dev/ttyS3"
demo = true

[faults]
capacity = 5
timezone_offset = -7

[link]
poll_limit = 10
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.serial_device, "/dev/ttyS3");
        assert!(config.demo);
        assert_eq!(config.faults.capacity, 5);
        assert_eq!(config.faults.timezone_offset, -7);
        assert_eq!(config.faults.name, "faults");
        assert_eq!(config.link.poll_limit, 10);
        assert_eq!(config.link.poll_delay_ms, 150);
        assert_eq!(config.baud_rate, 38_400);
    }

    #[test]
    fn test_nvm_fit() {
        let config = AppConfig {
            nvm_size: 100,
            nvm_start: 10,
            ..Default::default()
        };
        assert!(config.check_nvm_fit(90).is_ok());
        assert!(matches!(
            config.check_nvm_fit(91),
            Err(SettingsError::NvmTooSmall { needed: 101, size: 100 })
        ));
    }
}
