use super::{AudioBackend, AudioFormat, CpalFrameSource, DeviceInfo, SampleRate};
use crate::error::{RecorderError, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat};

/// The platform's default audio host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn device_at(&self, index: usize) -> Result<Device> {
        self.host
            .devices()
            .map_err(|err| RecorderError::Backend(format!("failed to enumerate devices: {err}")))?
            .nth(index)
            .ok_or(RecorderError::DeviceNotFound { index })
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn max_input_channels(device: &Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|range| range.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

impl AudioBackend for CpalBackend {
    type Source = CpalFrameSource;

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let devices = self
            .host
            .devices()
            .map_err(|err| RecorderError::Backend(format!("failed to enumerate devices: {err}")))?;
        Ok(devices
            .enumerate()
            .map(|(index, device)| DeviceInfo {
                index,
                name: device
                    .name()
                    .unwrap_or_else(|_| "Unknown Device".to_string()),
                max_input_channels: max_input_channels(&device),
            })
            .collect())
    }

    fn supports_input(&self, device: usize, channels: u16, sample_rate: SampleRate) -> bool {
        let Ok(device) = self.device_at(device) else {
            return false;
        };
        let Ok(mut configs) = device.supported_input_configs() else {
            return false;
        };
        configs.any(|range| {
            range.channels() == channels
                && range.sample_format() == SampleFormat::I16
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
        })
    }

    fn open(&self, device: usize, format: &AudioFormat) -> Result<Self::Source> {
        let device = self.device_at(device)?;
        CpalFrameSource::open(&device, format)
    }
}
