//! # Error Types
//!
//! Custom error types for the CCU spectrum core using `thiserror`.

use thiserror::Error;

/// Main error type for the CCU spectrum core
#[derive(Debug, Error)]
pub enum ProbeError {
    /// MAVLink framing errors
    #[error("MAVLink protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Requested processing window does not fit the frame
    #[error("Invalid window: {0}")]
    Window(String),

    /// Capture hardware reported a failure
    #[error("Capture hardware error: {0}")]
    Hardware(String),

    /// A bounded wait expired (test harness use only)
    #[error("Timed out after {0} ms waiting for a frame")]
    Timeout(u64),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the CCU spectrum core
pub type Result<T> = std::result::Result<T, ProbeError>;
