pub mod audio;
pub mod catalog;
pub mod config;
mod error;
pub mod job;
pub mod signal;
pub mod telemetry;

pub use audio::{
    AudioFormat, CpalBackend, Frame, RecordSummary, RecorderConfig, RecordingEngine, SampleRate,
};
pub use catalog::{CatalogError, RecordingCatalog};
pub use error::{RecorderError, Result};
pub use job::{spawn_recorder, RecorderJob};
