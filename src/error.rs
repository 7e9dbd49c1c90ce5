//! # Error Types
//!
//! Errors for everything around the link engine, using `thiserror`. The
//! engine itself reports problems through its session state only.

use thiserror::Error;

/// Main error type for FlySky Link
#[derive(Debug, Error)]
pub enum FlySkyLinkError {
    /// Serial port could not be opened or written
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("No serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telemetry record could not be serialized
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Result type alias for FlySky Link
pub type Result<T> = std::result::Result<T, FlySkyLinkError>;
