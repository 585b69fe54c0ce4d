//! Background worker that runs a recorder next to other services (for example
//! something serving the recordings directory).

use crate::audio::{AudioBackend, CpalBackend, RecordSummary, RecorderConfig, RecordingEngine};
use crate::error::{RecorderError, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Handle for a recorder running on its own thread.
pub struct RecorderJob {
    handle: Option<thread::JoinHandle<Result<RecordSummary>>>,
    stop_flag: Arc<AtomicBool>,
}

impl RecorderJob {
    /// Ask the recorder to stop at the next chunk boundary.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Wait for the worker and return what it recorded.
    pub fn join(mut self) -> Result<RecordSummary> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| RecorderError::Backend("recorder already joined".to_string()))?;
        handle
            .join()
            .map_err(|_| RecorderError::Backend("recorder thread panicked".to_string()))?
    }
}

/// Spawn a recorder on the default audio host.
pub fn spawn_recorder(config: RecorderConfig) -> io::Result<RecorderJob> {
    spawn_recorder_with(CpalBackend::new, config)
}

/// Spawn a recorder whose backend is built on the worker thread, since audio
/// streams are not always `Send`.
pub fn spawn_recorder_with<B, F>(make_backend: F, config: RecorderConfig) -> io::Result<RecorderJob>
where
    B: AudioBackend,
    F: FnOnce() -> B + Send + 'static,
{
    let stop_flag = Arc::new(AtomicBool::new(false));
    let worker_flag = stop_flag.clone();
    let handle = thread::Builder::new()
        .name("sentinel-recorder".to_string())
        .spawn(move || {
            let mut engine =
                RecordingEngine::new(make_backend(), config)?.with_stop_flag(worker_flag);
            info!(device = engine.device_index(), "background recorder started");
            engine.record()
        })?;
    Ok(RecorderJob {
        handle: Some(handle),
        stop_flag,
    })
}
