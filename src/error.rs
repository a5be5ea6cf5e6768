//! # Error Types Module
//!
//! Centralized error handling for the ECG monitor.
//! Provides custom error types for each module with proper context and error chaining.
//!
//! ## Error Types
//! - `AcquisitionError`: Serial port and byte-source read failures
//! - `ConfigError`: Configuration file I/O, parsing and validation errors
//! - `ScanError`: Serial port enumeration errors
//!
//! ## What is NOT an error here
//! Framing, length and checksum failures on the wire are recovered inside the
//! frame decoder and reported as `DecodeEvent`s, never as `Err` values. An
//! estimation pass with too few peaks is a normal outcome of the estimator.

use std::fmt;

/// Errors that can occur while acquiring bytes from the device
#[derive(Debug)]
pub enum AcquisitionError {
    /// Failed to open the serial port
    PortOpen { port: String, reason: String },
    /// Reading from the byte source failed
    Read(std::io::Error),
    /// Failed to spawn the acquisition thread
    ThreadSpawn(std::io::Error),
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::PortOpen { port, reason } => {
                write!(f, "Failed to open serial port {}: {}", port, reason)
            }
            AcquisitionError::Read(e) => {
                write!(f, "Failed to read from device: {}", e)
            }
            AcquisitionError::ThreadSpawn(e) => {
                write!(f, "Failed to start acquisition thread: {}", e)
            }
        }
    }
}

impl std::error::Error for AcquisitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcquisitionError::PortOpen { .. } => None,
            AcquisitionError::Read(e) => Some(e),
            AcquisitionError::ThreadSpawn(e) => Some(e),
        }
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// A value is out of its allowed range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::Invalid(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Errors that can occur while listing serial ports
#[derive(Debug, Clone)]
pub enum ScanError {
    /// The operating system refused to enumerate ports
    Enumerate(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Enumerate(msg) => {
                write!(f, "Failed to list serial ports: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScanError {}
