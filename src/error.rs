use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by device discovery, capture, and WAV output.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("no audio input device found")]
    NoInputDevice,

    #[error("no supported sample rate found for input device {device}")]
    UnsupportedFormat { device: usize },

    #[error("input device {index} not found")]
    DeviceNotFound { index: usize },

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("audio stream disconnected")]
    StreamClosed,

    #[error("failed to write {}: {source}", path.display())]
    IoWrite {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed to prepare output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RecorderError>;
