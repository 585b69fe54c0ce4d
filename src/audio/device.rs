//! Input device selection and sample-rate negotiation.

use super::{AudioBackend, SampleRate, CANDIDATE_RATES, CHANNELS};
use crate::error::{RecorderError, Result};
use tracing::{info, warn};

/// Pick the capture device index.
///
/// An explicit index is trusted as-is. Otherwise the first input-capable device
/// whose name contains `marker` wins, then the first input-capable device.
pub fn resolve_device<B: AudioBackend>(
    backend: &B,
    preferred: Option<usize>,
    marker: &str,
) -> Result<usize> {
    if let Some(index) = preferred {
        return Ok(index);
    }

    info!("discovering input devices");
    let devices = backend.devices()?;
    let inputs: Vec<_> = devices.iter().filter(|device| device.is_input()).collect();

    for device in &inputs {
        info!(
            index = device.index,
            name = %device.name,
            channels = device.max_input_channels,
            "found input device"
        );
        if !marker.is_empty() && device.name.contains(marker) {
            info!(index = device.index, name = %device.name, "selected preferred input device");
            return Ok(device.index);
        }
    }

    match inputs.first() {
        Some(device) => {
            warn!(
                index = device.index,
                name = %device.name,
                "using fallback input device"
            );
            Ok(device.index)
        }
        None => Err(RecorderError::NoInputDevice),
    }
}

/// First candidate rate the device accepts for stereo 16-bit input.
pub fn negotiate_sample_rate<B: AudioBackend>(backend: &B, device: usize) -> Result<SampleRate> {
    let rate = CANDIDATE_RATES
        .iter()
        .copied()
        .find(|&rate| backend.supports_input(device, CHANNELS, rate))
        .ok_or(RecorderError::UnsupportedFormat { device })?;
    info!(sample_rate = rate, device, "detected sample rate");
    Ok(rate)
}
