//! Command-line parsing and validation helpers.

mod validation;

use crate::audio::{
    RecorderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_DEVICE_MARKER, DEFAULT_DURATION_SECS,
    DEFAULT_OUTPUT_DIR, DEFAULT_SILENCE_TIMEOUT_SECS, DEFAULT_THRESHOLD,
};
use crate::telemetry::LogOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Longest segment whose data chunk still fits a 32-bit WAV size field at
/// 48 kHz stereo 16-bit.
pub const MAX_DURATION_SECS: u64 = u32::MAX as u64 / (48_000 * 2 * 2);
pub const MIN_CHUNK_SIZE: usize = 64;
pub const MAX_CHUNK_SIZE: usize = 16_384;

/// CLI options for the sentinel recorder.
#[derive(Debug, Parser, Clone)]
#[command(about = "Sentinel audio recorder", author, version)]
pub struct AppConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    /// Write JSON trace records to $SENTINEL_TRACE_LOG instead of stderr
    #[arg(long = "log-json", env = "SENTINEL_LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,

    /// Disable all logging
    #[arg(long = "no-logs", env = "SENTINEL_NO_LOGS", global = true, default_value_t = false)]
    pub no_logs: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Start a new recording
    Start(StartArgs),
    /// Stop the current recording (not implemented, use Ctrl+C)
    Stop,
    /// List recordings, newest first
    List(ListArgs),
    /// Print detected audio input devices
    Devices,
}

#[derive(Debug, Args, Clone)]
pub struct StartArgs {
    /// Recording duration in seconds
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    pub duration: u64,

    /// Input device index (skips discovery)
    #[arg(long)]
    pub card: Option<usize>,

    /// Continuously roll recordings over every duration
    #[arg(long = "loop", default_value_t = false)]
    pub loop_recording: bool,

    /// Enable noise-activated recording
    #[arg(long, default_value_t = false)]
    pub trigger: bool,

    /// RMS volume threshold for trigger mode
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u32,

    /// Seconds of silence before a triggered recording is saved
    #[arg(long = "silence-timeout", default_value_t = DEFAULT_SILENCE_TIMEOUT_SECS)]
    pub silence_timeout: u64,

    /// Directory recordings are written to
    #[arg(long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Frames per read
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Device name substring preferred during discovery
    #[arg(long = "device-marker", default_value = DEFAULT_DEVICE_MARKER)]
    pub device_marker: String,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Directory to list
    #[arg(long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,
}

impl AppConfig {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.verbose,
            json: self.log_json,
            disabled: self.no_logs,
        }
    }
}

impl From<&StartArgs> for RecorderConfig {
    fn from(args: &StartArgs) -> Self {
        Self {
            duration_secs: args.duration,
            loop_recording: args.loop_recording,
            trigger: args.trigger,
            threshold: f64::from(args.threshold),
            silence_timeout_secs: args.silence_timeout,
            output_dir: args.output_dir.clone(),
            device_index: args.card,
            chunk_size: args.chunk_size,
            device_marker: args.device_marker.clone(),
        }
    }
}
