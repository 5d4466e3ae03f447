//! Error types for sonobridge
//!
//! Centralized error handling using thiserror. None of these ever cross the
//! consumer boundary as hard faults: the engine folds them into tagged band
//! vectors or `false` command results.

use thiserror::Error;

/// Failure to open or configure the OS spectral capture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture device busy")]
    DeviceBusy,

    #[error("Invalid capture session: {0}")]
    InvalidSession(i32),

    #[error("Capture initialization failed: {0}")]
    Init(String),
}

/// Main error type for the sonobridge engine
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Capture permission denied")]
    PermissionDenied,

    #[error("Audio focus request was not granted")]
    FocusRequestFailed,

    #[error("Foreground service failed to start: {0}")]
    ServiceStartFailed(String),

    #[error("Foreground service failed to stop: {0}")]
    ServiceStopFailed(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for sonobridge
pub type Result<T> = std::result::Result<T, BridgeError>;
