//! WAV output and segment naming.

use super::{AudioFormat, Frame};
use crate::error::{RecorderError, Result};
use chrono::{Local, NaiveDateTime};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A finished recording waiting to be written.
#[derive(Debug, Clone)]
pub struct Segment {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub frames: Vec<Frame>,
}

impl Segment {
    pub fn write(&self) -> Result<()> {
        write_wav(&self.path, &self.frames, &self.format)
    }
}

/// Write `frames` as a PCM WAV file.
///
/// The payload is the frames concatenated in order. The file is complete once
/// this returns `Ok`; on error nothing is left behind at `path`.
pub fn write_wav(path: &Path, frames: &[Frame], format: &AudioFormat) -> Result<()> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format: hound::SampleFormat::Int,
    };
    write_samples(path, spec, frames).map_err(|source| {
        discard_partial(path);
        RecorderError::IoWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn write_samples(
    path: &Path,
    spec: hound::WavSpec,
    frames: &[Frame],
) -> std::result::Result<(), hound::Error> {
    let mut writer = hound::WavWriter::create(path, spec)?;
    for frame in frames {
        for sample in frame.samples() {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()
}

/// Best-effort removal of a half-written file.
fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial recording"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(%err, path = %path.display(), "failed to remove partial recording"),
    }
}

/// Header fields of a written WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Samples per channel.
    pub frames: u32,
    /// Samples across all channels.
    pub total_samples: u32,
}

pub fn read_wav_header(path: &Path) -> std::result::Result<WavHeader, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(WavHeader {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
        total_samples: reader.len(),
    })
}

/// Produces `recording_<YYYYmmdd_HHMMSS>.wav` paths.
///
/// Two segments inside the same second get `_1`, `_2`, ... appended, as does a
/// name that already exists on disk.
#[derive(Debug)]
pub struct SegmentNamer {
    output_dir: PathBuf,
    last_stem: Option<String>,
    last_suffix: u32,
}

impl SegmentNamer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            last_stem: None,
            last_suffix: 0,
        }
    }

    pub fn next_path(&mut self) -> PathBuf {
        self.path_at(Local::now().naive_local())
    }

    pub fn path_at(&mut self, now: NaiveDateTime) -> PathBuf {
        let stem = format!("recording_{}", now.format("%Y%m%d_%H%M%S"));
        let mut suffix = if self.last_stem.as_deref() == Some(stem.as_str()) {
            self.last_suffix + 1
        } else {
            0
        };
        let mut path = self.output_dir.join(file_name(&stem, suffix));
        while path.exists() {
            suffix += 1;
            path = self.output_dir.join(file_name(&stem, suffix));
        }
        self.last_stem = Some(stem);
        self.last_suffix = suffix;
        path
    }
}

fn file_name(stem: &str, suffix: u32) -> String {
    if suffix == 0 {
        format!("{stem}.wav")
    } else {
        format!("{stem}_{suffix}.wav")
    }
}
