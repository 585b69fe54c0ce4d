//! Audio capture and noise-triggered recording pipeline.
//!
//! Devices are discovered and opened through an [`AudioBackend`]. Captured PCM
//! arrives as fixed-size [`Frame`]s and the [`RecordingEngine`] turns them into
//! WAV segments, either on a fixed schedule or when the input gets loud.

use crate::error::Result;
use std::path::PathBuf;

/// Interleaved channel count for every capture stream.
pub const CHANNELS: u16 = 2;

/// Bytes per sample (signed 16-bit little-endian PCM).
pub const SAMPLE_WIDTH: u16 = 2;

/// Frames requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Sample rates tried during negotiation, best first.
pub const CANDIDATE_RATES: [SampleRate; 5] = [48_000, 44_100, 32_000, 16_000, 8_000];

/// Substring that marks the preferred capture interface.
pub const DEFAULT_DEVICE_MARKER: &str = "USB Audio CODEC";

pub const DEFAULT_DURATION_SECS: u64 = 300;
pub const DEFAULT_THRESHOLD: u32 = 1500;
pub const DEFAULT_SILENCE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "recordings";

mod backend;
mod device;
mod engine;
mod frame;
mod meter;
mod source;
#[cfg(test)]
mod tests;
mod wav;

pub use backend::CpalBackend;
pub use device::{negotiate_sample_rate, resolve_device};
pub use engine::{RecordSummary, RecordingEngine, TriggerEvent, TriggerMachine, TriggerState};
pub use frame::Frame;
pub use meter::rms;
pub use source::CpalFrameSource;
pub use wav::{read_wav_header, write_wav, Segment, SegmentNamer, WavHeader};

pub type SampleRate = u32;

/// Stream parameters chosen once per recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_width: u16,
    pub sample_rate: SampleRate,
    pub chunk_size: usize,
}

impl AudioFormat {
    pub fn new(sample_rate: SampleRate, chunk_size: usize) -> Self {
        Self {
            channels: CHANNELS,
            sample_width: SAMPLE_WIDTH,
            sample_rate,
            chunk_size,
        }
    }

    /// Interleaved samples carried by one frame.
    pub fn samples_per_frame(&self) -> usize {
        self.chunk_size * usize::from(self.channels)
    }

    /// Byte length of every frame a source produces.
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * usize::from(self.sample_width)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Wall-clock length of one frame.
    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_size as f64 / f64::from(self.sample_rate)
    }

    /// Frames needed to cover `duration_secs`, rounded up. Saturates instead
    /// of overflowing.
    pub fn chunks_for(&self, duration_secs: u64) -> usize {
        let samples = u64::from(self.sample_rate).saturating_mul(duration_secs);
        let chunk = self.chunk_size.max(1) as u64;
        usize::try_from(samples.div_ceil(chunk)).unwrap_or(usize::MAX)
    }
}

/// One enumerated audio device. Only lives for the duration of discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
}

impl DeviceInfo {
    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }
}

/// Recorder settings, fixed for the lifetime of a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub duration_secs: u64,
    pub loop_recording: bool,
    pub trigger: bool,
    pub threshold: f64,
    pub silence_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub device_index: Option<usize>,
    pub chunk_size: usize,
    pub device_marker: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            loop_recording: false,
            trigger: false,
            threshold: f64::from(DEFAULT_THRESHOLD),
            silence_timeout_secs: DEFAULT_SILENCE_TIMEOUT_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            device_index: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            device_marker: DEFAULT_DEVICE_MARKER.to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin capture to a device index, skipping discovery.
    pub fn with_device(mut self, index: usize) -> Self {
        self.device_index = Some(index);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Fixed-duration segments, repeated forever when `repeat` is set.
    pub fn looped(mut self, duration_secs: u64, repeat: bool) -> Self {
        self.trigger = false;
        self.duration_secs = duration_secs;
        self.loop_recording = repeat;
        self
    }

    /// Noise-activated clips closed after `silence_timeout_secs` of quiet.
    pub fn triggered(mut self, threshold: f64, silence_timeout_secs: u64) -> Self {
        self.trigger = true;
        self.threshold = threshold;
        self.silence_timeout_secs = silence_timeout_secs;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Blocking producer of fixed-size PCM frames from one open stream.
pub trait FrameSource {
    /// Block until a full frame is available.
    fn read(&mut self) -> Result<Frame>;

    /// Stop and release the stream. Safe to call more than once.
    fn close(&mut self);
}

/// Capability queries plus stream opening for one audio host.
pub trait AudioBackend {
    type Source: FrameSource;

    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Whether `device` accepts signed 16-bit input with this channel count and rate.
    fn supports_input(&self, device: usize, channels: u16, sample_rate: SampleRate) -> bool;

    fn open(&self, device: usize, format: &AudioFormat) -> Result<Self::Source>;
}
