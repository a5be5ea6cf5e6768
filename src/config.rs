//! # Configuration Management Module
//!
//! Operator settings stored in platform-appropriate locations.
//! Read once at startup; nothing here changes while the monitor runs.
//!
//! ## Settings
//! - `serial_port` / `enable_autoconnect`: Device to open at startup
//! - `baud_rate`, `read_timeout_ms`, `retry_delay_ms`: Serial link behaviour
//! - `display_seconds`: Length of the sample window
//! - `peak_threshold_volts`, `max_heart_rate_bpm`: R-wave detection
//! - `refresh_interval_ms`: Estimation and redraw tick
//! - `simulated_bpm`: Rate produced by the built-in synthetic device
//! - `simulated_corrupt_every`: Break every Nth synthetic frame (0 = never)
//!
//! The wire format itself (header, payload length, sample width, sample rate)
//! is fixed in `frame` and is not configurable.
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/ecg-monitor/config.toml
//! - Linux: ~/.config/ecg-monitor/config.toml
//! - Windows: %APPDATA%\ecg-monitor\config.toml

use crate::error::ConfigError;
use crate::frame::SAMPLE_RATE_HZ;
use crate::heart_rate::{min_peak_distance, EstimatorSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial_port: String,
    pub enable_autoconnect: bool,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub display_seconds: f64,
    pub peak_threshold_volts: f64,
    pub max_heart_rate_bpm: f64,
    pub refresh_interval_ms: u64,
    pub simulated_bpm: f64,
    pub simulated_corrupt_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".to_string(),
            enable_autoconnect: false,
            baud_rate: 9600,
            read_timeout_ms: 200,
            retry_delay_ms: 1000,
            display_seconds: 5.0,
            peak_threshold_volts: 1.5,
            max_heart_rate_bpm: 200.0,
            refresh_interval_ms: 100,
            simulated_bpm: 72.0,
            simulated_corrupt_every: 0,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecg-monitor")
            .join("config.toml")
    }

    /// Load config from the default location, creating it with defaults if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(ConfigError::ParseFailed)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string)
            .map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("display_seconds", self.display_seconds),
            ("peak_threshold_volts", self.peak_threshold_volts),
            ("max_heart_rate_bpm", self.max_heart_rate_bpm),
            ("simulated_bpm", self.simulated_bpm),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 || self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "read_timeout_ms and refresh_interval_ms must be positive".to_string(),
            ));
        }
        if self.min_peak_distance() == 0 {
            return Err(ConfigError::Invalid(format!(
                "max_heart_rate_bpm {} is too high for a {} Hz sample rate",
                self.max_heart_rate_bpm, SAMPLE_RATE_HZ
            )));
        }

        Ok(())
    }

    pub fn min_peak_distance(&self) -> usize {
        min_peak_distance(SAMPLE_RATE_HZ, self.max_heart_rate_bpm)
    }

    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            threshold_volts: self.peak_threshold_volts,
            min_peak_distance: self.min_peak_distance(),
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
