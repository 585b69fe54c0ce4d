//! Sentinel recorder entrypoint.
//!
//! `start` runs the recorder in the foreground until its mode finishes or the
//! process is interrupted; the other commands only inspect devices or the
//! recordings directory.

mod cli_utils;

use anyhow::{Context, Result};
use sentinel::config::{AppConfig, Command, StartArgs};
use sentinel::signal::install_interrupt_handler;
use sentinel::telemetry::init_tracing;
use sentinel::{CpalBackend, RecorderConfig, RecordingEngine};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

use crate::cli_utils::{list_input_devices, list_recordings};

fn main() -> ExitCode {
    let config = match AppConfig::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.log_options());

    let result = match &config.command {
        Command::Start(args) => start(args),
        Command::Stop => {
            println!("Stop is not implemented yet. Use Ctrl+C to stop a running recorder.");
            Ok(())
        }
        Command::List(args) => list_recordings(&args.output_dir),
        Command::Devices => list_input_devices(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn start(args: &StartArgs) -> Result<()> {
    let recorder_config = RecorderConfig::from(args);
    let stop_flag = install_interrupt_handler(Arc::new(AtomicBool::new(false)))?;

    info!("starting audio recording");
    let mut engine = RecordingEngine::new(CpalBackend::new(), recorder_config)
        .context("failed to initialize recorder")?
        .with_stop_flag(stop_flag);
    let summary = engine.record().context("recording failed")?;
    info!(
        written = summary.segments_written(),
        failed = summary.segments_failed,
        interrupted = summary.interrupted,
        "audio interface closed"
    );
    Ok(())
}
