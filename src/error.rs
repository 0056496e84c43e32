// src/error.rs
use crate::session::LicenseAnswer;
use thiserror::Error;

/// Failures while acquiring frames. None of these are fatal: the source is
/// retried on the next tick.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture device available")]
    NoDevice,

    #[error("capture device busy: {0}")]
    DeviceBusy(String),

    #[error("failed to open camera stream: {0}")]
    Stream(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("source has no frame ready")]
    NoFrame,

    #[error("no more frames in video")]
    EndOfVideo,

    #[error("video source error: {0}")]
    Video(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tracking engine rejected license: {0:?}")]
    License(LicenseAnswer),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("pipeline has been disposed")]
    Disposed,

    #[error("finger index must be between 0 and 5, got {0}")]
    InvalidFingerIndex(i32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
