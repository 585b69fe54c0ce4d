//! CPAL-backed frame source.
//!
//! cpal delivers samples on its own callback thread in whatever block size the
//! host picks. The callback slices them into fixed-size chunks and hands them
//! over a bounded channel, so `read()` on the capture thread always sees whole
//! frames.

use super::{AudioFormat, Frame, FrameSource};
use crate::error::{RecorderError, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Chunks buffered between the audio callback and the capture loop.
const CHUNK_QUEUE_CAPACITY: usize = 256;

/// Further drops needed before another overflow warning.
const DROP_REPORT_INTERVAL: usize = 100;

/// Decides when a growing dropped-chunk count is worth a warning: the first
/// drop, then every [`DROP_REPORT_INTERVAL`] more.
#[derive(Debug, Default)]
pub(super) struct DropReporter {
    reported: usize,
}

impl DropReporter {
    /// Returns the total to report, if it has grown enough since the last one.
    pub(super) fn observe(&mut self, dropped: usize) -> Option<usize> {
        let due = if self.reported == 0 {
            dropped > 0
        } else {
            dropped >= self.reported.saturating_add(DROP_REPORT_INTERVAL)
        };
        if due {
            self.reported = dropped;
            Some(dropped)
        } else {
            None
        }
    }
}

pub(super) struct ChunkDispatcher {
    chunk_samples: usize,
    pending: Vec<i16>,
    sender: Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
}

impl ChunkDispatcher {
    pub(super) fn new(
        chunk_samples: usize,
        sender: Sender<Vec<i16>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        let chunk_samples = chunk_samples.max(1);
        Self {
            chunk_samples,
            pending: Vec::with_capacity(chunk_samples * 2),
            sender,
            dropped,
        }
    }

    /// Buffer interleaved samples and forward every complete chunk.
    ///
    /// A full queue drops the chunk and counts it; the callback never blocks.
    pub(super) fn push(&mut self, data: &[i16]) {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= self.chunk_samples {
            let chunk: Vec<i16> = self.pending.drain(..self.chunk_samples).collect();
            if let Err(err) = self.sender.try_send(chunk) {
                match err {
                    TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    TrySendError::Disconnected(_) => {
                        self.pending.clear();
                        break;
                    }
                }
            }
        }
    }
}

/// One open input stream bound to a device and format.
pub struct CpalFrameSource {
    stream: Option<Stream>,
    receiver: Receiver<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    drop_reporter: DropReporter,
    stream_errors: Arc<AtomicU64>,
}

impl CpalFrameSource {
    pub(super) fn open(device: &Device, format: &AudioFormat) -> Result<Self> {
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let (sender, receiver) = bounded::<Vec<i16>>(CHUNK_QUEUE_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let stream_errors = Arc::new(AtomicU64::new(0));
        let mut dispatcher =
            ChunkDispatcher::new(format.samples_per_frame(), sender, dropped.clone());

        // Overruns and xruns show up here. They are non-fatal, so log the first
        // one and then only every thousandth.
        let error_count = stream_errors.clone();
        let err_fn = move |err: cpal::StreamError| {
            let count = error_count.fetch_add(1, Ordering::Relaxed);
            if count == 0 {
                warn!(%err, "audio stream error (non-fatal, capture continues)");
            } else if count % 1000 == 0 {
                debug!(count, "audio stream errors so far");
            }
        };

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| dispatcher.push(data),
                err_fn,
                None,
            )
            .map_err(|err| RecorderError::Backend(format!("failed to open input stream: {err}")))?;
        stream
            .play()
            .map_err(|err| RecorderError::Backend(format!("failed to start input stream: {err}")))?;

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            chunk_size = format.chunk_size,
            "input stream opened"
        );

        Ok(Self {
            stream: Some(stream),
            receiver,
            dropped,
            drop_reporter: DropReporter::default(),
            stream_errors,
        })
    }
}

impl FrameSource for CpalFrameSource {
    fn read(&mut self) -> Result<Frame> {
        if self.stream.is_none() {
            return Err(RecorderError::StreamClosed);
        }
        let samples = self
            .receiver
            .recv()
            .map_err(|_| RecorderError::StreamClosed)?;
        if let Some(dropped) = self.drop_reporter.observe(self.dropped.load(Ordering::Relaxed)) {
            warn!(dropped, "input overflow: chunks dropped while the recorder fell behind");
        }
        Ok(Frame::from_samples(&samples))
    }

    fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if let Err(err) = stream.pause() {
            debug!(%err, "failed to pause audio stream");
        }
        drop(stream);

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped, "input stream closed with dropped chunks");
        }
        let errors = self.stream_errors.load(Ordering::Relaxed);
        debug!(stream_errors = errors, "input stream closed");
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
