//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and key has a default, so an empty file (or no file at all)
//! yields a working configuration that listens on `udp://:14540`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{DashboardError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// Telemetry source connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub require_healthy: bool,

    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    #[serde(default = "default_gcs_heartbeat_hz")]
    pub gcs_heartbeat_hz: f32,
}

/// Terminal display configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

/// File logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Snapshot recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_recording_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_recording_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_address() -> String { "udp://:14540".to_string() }
fn default_timeout_secs() -> u64 { 10 }
fn default_heartbeat_timeout_ms() -> u64 { 3000 }
fn default_gcs_heartbeat_hz() -> f32 { 1.0 }

fn default_refresh_hz() -> u32 { 10 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_log_level() -> String { "info".to_string() }

fn default_recording_dir() -> String { "./recordings".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_recording_interval_ms() -> u64 { 1000 }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_secs: default_timeout_secs(),
            require_healthy: false,
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            gcs_heartbeat_hz: default_gcs_heartbeat_hz(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { refresh_hz: default_refresh_hz() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_recording_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            interval_ms: default_recording_interval_ms(),
        }
    }
}

/// Lowest accepted ground-station heartbeat rate
const MIN_GCS_HEARTBEAT_HZ: f32 = 0.1;

impl ConnectionConfig {
    /// Bounded wait for the first autopilot heartbeat
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Silence after which the link is reported as lost
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Period of the ground-station heartbeat
    ///
    /// Rates below the validated minimum are clamped to 0.1 Hz.
    pub fn gcs_heartbeat_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.gcs_heartbeat_hz.max(MIN_GCS_HEARTBEAT_HZ))
    }
}

impl DisplayConfig {
    /// Render tick period (100 ms at the default 10 Hz)
    ///
    /// A zero rate is treated as 1 Hz.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(1000 / self.refresh_hz.max(1) as u64)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use drone_dashboard::config::Config;
    ///
    /// let config = Config::load("config/dashboard.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.connection.address.trim().is_empty() {
            return Err(invalid("connection address cannot be empty"));
        }

        if self.connection.timeout_secs == 0 || self.connection.timeout_secs > 120 {
            return Err(invalid("timeout_secs must be between 1 and 120"));
        }

        if self.connection.heartbeat_timeout_ms < 500 || self.connection.heartbeat_timeout_ms > 60000 {
            return Err(invalid("heartbeat_timeout_ms must be between 500 and 60000"));
        }

        if !(0.1..=10.0).contains(&self.connection.gcs_heartbeat_hz) {
            return Err(invalid("gcs_heartbeat_hz must be between 0.1 and 10.0"));
        }

        if self.display.refresh_hz == 0 || self.display.refresh_hz > 60 {
            return Err(invalid("refresh_hz must be between 1 and 60"));
        }

        if self.logging.log_dir.is_empty() {
            return Err(invalid("logging log_dir cannot be empty"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        if self.recording.enabled && self.recording.log_dir.is_empty() {
            return Err(invalid("recording log_dir cannot be empty when enabled"));
        }

        if self.recording.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.recording.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.recording.interval_ms == 0 || self.recording.interval_ms > 60000 {
            return Err(invalid("recording interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> DashboardError {
    DashboardError::Config(toml::de::Error::custom(msg))
}
