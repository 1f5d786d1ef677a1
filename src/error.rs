//! Custom error types for the sdr-feed system

use thiserror::Error;

/// Main error type for the sdr-feed system
#[derive(Error, Debug)]
pub enum SdrError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Channel error: {0}")]
    Channel(String),
}

/// Audio acquisition errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to start demodulator: {0}")]
    ProcessStart(String),

    #[error("Failed to read audio stream: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("Captured audio too short: got {got} bytes, need at least {min}")]
    ShortCapture { got: usize, min: usize },

    #[error("Invalid capture window: {0}")]
    CaptureWindow(String),

    #[error("Failed to load fallback audio: {0}")]
    FallbackLoad(String),

    #[error("Failed to decode fallback audio: {0}")]
    Decode(String),

    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Failed to get device configuration: {0}")]
    DeviceConfig(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Stream playback error: {0}")]
    StreamPlay(String),
}

/// Spectrum scan errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to start scan tool: {0}")]
    ProcessStart(String),

    /// Carries the tool's diagnostic output verbatim
    #[error("{0}")]
    ToolFailure(String),

    #[error("Invalid scan range {low_hz}-{high_hz} Hz in {bin_hz} Hz bins")]
    InvalidRange { low_hz: u32, high_hz: u32, bin_hz: u32 },

    #[error("Scan grid mismatch: expected {expected} {axis}, got {got}")]
    GridMismatch {
        axis: GridAxis,
        expected: usize,
        got: usize,
    },
}

/// Which dimension of the scan grid failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    Rows,
    Columns,
}

impl std::fmt::Display for GridAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridAxis::Rows => write!(f, "rows"),
            GridAxis::Columns => write!(f, "columns"),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, SdrError>;
