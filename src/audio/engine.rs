//! Recording state machine.
//!
//! Looped mode captures fixed-length segments, reopening the stream for each
//! one. Triggered mode keeps one stream open and lets [`TriggerMachine`] decide
//! when loudness starts a clip and when enough trailing silence ends it.

use super::device::{negotiate_sample_rate, resolve_device};
use super::wav::{Segment, SegmentNamer};
use super::{rms, AudioBackend, AudioFormat, Frame, FrameSource, RecorderConfig};
use crate::error::{RecorderError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Upper bound on frames preallocated for one looped segment.
const MAX_PREALLOCATED_FRAMES: usize = 4096;

/// What a call to [`RecordingEngine::record`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub written: Vec<PathBuf>,
    pub segments_failed: usize,
    pub frames_written: usize,
    pub interrupted: bool,
}

impl RecordSummary {
    pub fn segments_written(&self) -> usize {
        self.written.len()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Recording,
}

/// Transitions reported by [`TriggerMachine::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A loud frame opened a new clip.
    Started,
    /// Silence ran past the timeout; the clip's frames are handed back.
    Finished(Vec<Frame>),
}

/// Per-run trigger state: current mode, open clip buffer, and the silence
/// accumulator.
///
/// Silence is tracked in samples per channel so the timeout comparison is
/// exact; `silence_secs` reports the same value in seconds.
#[derive(Debug)]
pub struct TriggerMachine {
    threshold: f64,
    chunk_size: u64,
    sample_rate: u64,
    timeout_samples: u64,
    state: TriggerState,
    frames: Vec<Frame>,
    silence_samples: u64,
}

impl TriggerMachine {
    pub fn new(threshold: f64, silence_timeout_secs: u64, format: &AudioFormat) -> Self {
        let sample_rate = u64::from(format.sample_rate);
        Self {
            threshold,
            chunk_size: format.chunk_size as u64,
            sample_rate,
            timeout_samples: silence_timeout_secs.saturating_mul(sample_rate),
            state: TriggerState::Idle,
            frames: Vec::new(),
            silence_samples: 0,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn silence_secs(&self) -> f64 {
        self.silence_samples as f64 / self.sample_rate.max(1) as f64
    }

    /// Feed one frame. Quiet frames while idle are discarded; every frame while
    /// recording is kept, trailing silence included.
    pub fn push(&mut self, frame: Frame) -> Option<TriggerEvent> {
        let volume = rms(&frame);
        let loud = volume > self.threshold;
        match (self.state, loud) {
            (TriggerState::Idle, false) => None,
            (TriggerState::Idle, true) => {
                self.state = TriggerState::Recording;
                self.frames.clear();
                self.frames.push(frame);
                self.silence_samples = 0;
                Some(TriggerEvent::Started)
            }
            (TriggerState::Recording, true) => {
                self.frames.push(frame);
                self.silence_samples = 0;
                None
            }
            (TriggerState::Recording, false) => {
                self.frames.push(frame);
                self.silence_samples = self.silence_samples.saturating_add(self.chunk_size);
                if self.silence_samples >= self.timeout_samples {
                    Some(TriggerEvent::Finished(self.take_clip()))
                } else {
                    None
                }
            }
        }
    }

    /// Close out the run. Returns the open clip, if any.
    pub fn finish(&mut self) -> Option<Vec<Frame>> {
        match self.state {
            TriggerState::Recording if !self.frames.is_empty() => Some(self.take_clip()),
            _ => {
                self.state = TriggerState::Idle;
                None
            }
        }
    }

    fn take_clip(&mut self) -> Vec<Frame> {
        self.state = TriggerState::Idle;
        self.silence_samples = 0;
        std::mem::take(&mut self.frames)
    }
}

enum CaptureEnd {
    Complete,
    Interrupted,
    Failed(RecorderError),
}

/// Drives one recorder instance: device, format, and the capture loop.
pub struct RecordingEngine<B: AudioBackend> {
    backend: B,
    config: RecorderConfig,
    device: usize,
    format: AudioFormat,
    namer: SegmentNamer,
    stop_flag: Arc<AtomicBool>,
}

impl<B: AudioBackend> RecordingEngine<B> {
    /// Resolve the device, negotiate the rate, and prepare the output directory.
    ///
    /// Any failure here aborts before a stream is opened.
    pub fn new(backend: B, config: RecorderConfig) -> Result<Self> {
        let device = resolve_device(&backend, config.device_index, &config.device_marker)?;
        let sample_rate = negotiate_sample_rate(&backend, device)?;
        let format = AudioFormat::new(sample_rate, config.chunk_size.max(1));

        std::fs::create_dir_all(&config.output_dir).map_err(|source| {
            RecorderError::OutputDir {
                path: config.output_dir.clone(),
                source,
            }
        })?;

        let namer = SegmentNamer::new(config.output_dir.clone());
        Ok(Self {
            backend,
            config,
            device,
            format,
            namer,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned stop flag (signal handler, job handle).
    pub fn with_stop_flag(mut self, stop_flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = stop_flag;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn device_index(&self) -> usize {
        self.device
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Run until the mode's stop condition or an interrupt.
    pub fn record(&mut self) -> Result<RecordSummary> {
        let mut summary = RecordSummary::default();
        let outcome = if self.config.trigger {
            self.record_triggered(&mut summary)
        } else {
            self.record_looped(&mut summary)
        };
        if summary.interrupted {
            info!("interrupted, recorder stopped");
        }
        match outcome {
            Ok(()) => Ok(summary),
            Err(err) => {
                error!(%err, "recording stopped");
                Err(err)
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn record_looped(&mut self, summary: &mut RecordSummary) -> Result<()> {
        let chunks = self.format.chunks_for(self.config.duration_secs);
        loop {
            if self.stop_requested() {
                summary.interrupted = true;
                return Ok(());
            }

            let path = self.namer.next_path();
            info!(path = %path.display(), chunks, "recording segment");

            let mut source = self.backend.open(self.device, &self.format)?;
            let mut frames = Vec::with_capacity(chunks.min(MAX_PREALLOCATED_FRAMES));
            let mut end = CaptureEnd::Complete;
            for _ in 0..chunks {
                if self.stop_requested() {
                    end = CaptureEnd::Interrupted;
                    break;
                }
                match source.read() {
                    Ok(frame) => frames.push(frame),
                    Err(err) => {
                        end = CaptureEnd::Failed(err);
                        break;
                    }
                }
            }
            source.close();

            if !frames.is_empty() {
                self.save(
                    Segment {
                        path,
                        format: self.format,
                        frames,
                    },
                    summary,
                );
            }

            match end {
                CaptureEnd::Complete => {}
                CaptureEnd::Interrupted => {
                    summary.interrupted = true;
                    return Ok(());
                }
                CaptureEnd::Failed(err) => return Err(err),
            }
            if !self.config.loop_recording {
                return Ok(());
            }
        }
    }

    fn record_triggered(&mut self, summary: &mut RecordSummary) -> Result<()> {
        info!(
            threshold = self.config.threshold,
            silence_timeout_secs = self.config.silence_timeout_secs,
            "waiting for sound to trigger recording"
        );
        let mut source = self.backend.open(self.device, &self.format)?;
        let mut machine = TriggerMachine::new(
            self.config.threshold,
            self.config.silence_timeout_secs,
            &self.format,
        );
        let mut clip_path: Option<PathBuf> = None;

        let end = loop {
            if self.stop_requested() {
                break CaptureEnd::Interrupted;
            }
            let frame = match source.read() {
                Ok(frame) => frame,
                Err(err) => break CaptureEnd::Failed(err),
            };
            match machine.push(frame) {
                Some(TriggerEvent::Started) => {
                    let path = self.namer.next_path();
                    info!(path = %path.display(), "triggered, started recording");
                    clip_path = Some(path);
                }
                Some(TriggerEvent::Finished(frames)) => {
                    info!(
                        silence_timeout_secs = self.config.silence_timeout_secs,
                        "saving after silence timeout"
                    );
                    let path = clip_path.take().unwrap_or_else(|| self.namer.next_path());
                    self.save(
                        Segment {
                            path,
                            format: self.format,
                            frames,
                        },
                        summary,
                    );
                }
                None => {}
            }
        };
        source.close();

        if let Some(frames) = machine.finish() {
            debug!(frames = frames.len(), "flushing open clip");
            let path = clip_path.take().unwrap_or_else(|| self.namer.next_path());
            self.save(
                Segment {
                    path,
                    format: self.format,
                    frames,
                },
                summary,
            );
        }

        match end {
            CaptureEnd::Interrupted => {
                summary.interrupted = true;
                Ok(())
            }
            CaptureEnd::Failed(err) => Err(err),
            CaptureEnd::Complete => Ok(()),
        }
    }

    /// Write a segment. Failures are logged and the frames dropped; the capture
    /// loop keeps going.
    fn save(&mut self, segment: Segment, summary: &mut RecordSummary) {
        let frame_count = segment.frames.len();
        match segment.write() {
            Ok(()) => {
                info!(path = %segment.path.display(), frames = frame_count, "saved");
                summary.frames_written += frame_count;
                summary.written.push(segment.path);
            }
            Err(err) => {
                error!(%err, frames = frame_count, "failed to save segment, dropping it");
                summary.segments_failed += 1;
            }
        }
    }
}
