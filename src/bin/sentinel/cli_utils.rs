use anyhow::{Context, Result};
use sentinel::audio::AudioBackend;
use sentinel::{CpalBackend, RecordingCatalog};
use std::path::Path;

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = CpalBackend::new()
        .devices()
        .context("Failed to list audio input devices")?;
    let inputs: Vec<_> = devices.into_iter().filter(|d| d.is_input()).collect();
    if inputs.is_empty() {
        println!("No audio input devices detected.");
        return Ok(());
    }
    println!("Available audio input devices:");
    for device in inputs {
        println!(
            "  [{}] {} ({} channels)",
            device.index, device.name, device.max_input_channels
        );
    }
    Ok(())
}

pub(crate) fn list_recordings(dir: &Path) -> Result<()> {
    let catalog = RecordingCatalog::new(dir);
    let recordings = catalog
        .list()
        .with_context(|| format!("Failed to list recordings in {}", dir.display()))?;
    if recordings.is_empty() {
        println!("No recordings found in {}.", dir.display());
        return Ok(());
    }
    for name in recordings {
        println!("{name}");
    }
    Ok(())
}
