//! CPAL-based device discovery
//!
//! Translates CPAL devices into the core's [`DeviceInfo`] model and resolves
//! configured device names back into CPAL handles for stream creation.

use cpal::traits::{DeviceTrait, HostTrait};
use eqchain_core::domain::audio::{
    AudioEnumerator, AudioError, ChannelCount, DeviceId, DeviceInfo, DeviceType, Result, SampleRate,
};
use tracing::{debug, info, warn};

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown Device".to_string())
}

/// Build the domain description of a CPAL device
fn describe(device: &cpal::Device, device_type: DeviceType) -> DeviceInfo {
    let name = device_name(device);

    let mut sample_rates = Vec::new();
    let mut channel_counts = Vec::new();
    let mut collect = |rate: u32, channels: u16| {
        if !sample_rates.iter().any(|sr: &SampleRate| sr.hz() == rate) {
            sample_rates.push(SampleRate::from_hz(rate));
        }
        if !channel_counts.iter().any(|cc: &ChannelCount| cc.count() == channels) {
            channel_counts.push(ChannelCount::from_count(channels));
        }
    };

    if matches!(device_type, DeviceType::Input | DeviceType::Duplex) {
        if let Ok(configs) = device.supported_input_configs() {
            for config in configs {
                collect(config.min_sample_rate(), config.channels());
                collect(config.max_sample_rate(), config.channels());
            }
        }
    }
    if matches!(device_type, DeviceType::Output | DeviceType::Duplex) {
        if let Ok(configs) = device.supported_output_configs() {
            for config in configs {
                collect(config.min_sample_rate(), config.channels());
                collect(config.max_sample_rate(), config.channels());
            }
        }
    }

    sample_rates.sort_by_key(|sr| sr.hz());
    channel_counts.sort_by_key(|cc| cc.count());

    let default_config = match device_type {
        DeviceType::Output => device.default_output_config(),
        _ => device
            .default_input_config()
            .or_else(|_| device.default_output_config()),
    };
    let default_sample_rate = default_config
        .ok()
        .map(|config| SampleRate::from_hz(config.sample_rate()));

    debug!("Described device: {}", name);

    DeviceInfo {
        // Names are the only identifier stable across CPAL hosts
        id: DeviceId::new(name.clone()),
        name,
        device_type,
        sample_rates,
        channel_counts,
        default_sample_rate,
    }
}

/// Resolve a device for the given direction
///
/// `None` selects the host default; a name selects the first device of that
/// direction whose name matches exactly.
pub fn find_device(
    host: &cpal::Host,
    name: Option<&str>,
    direction: DeviceType,
) -> Result<cpal::Device> {
    let wants_input = matches!(direction, DeviceType::Input);
    match name {
        None => {
            let device = if wants_input {
                host.default_input_device()
            } else {
                host.default_output_device()
            };
            device.ok_or_else(|| {
                AudioError::DeviceNotFound(format!(
                    "No default {} device",
                    if wants_input { "input" } else { "output" }
                ))
            })
        }
        Some(name) => {
            let named = |d: &cpal::Device| device_name(d) == name;
            let found = if wants_input {
                host.input_devices()
                    .map_err(|e| AudioError::OsError(e.to_string()))?
                    .find(named)
            } else {
                host.output_devices()
                    .map_err(|e| AudioError::OsError(e.to_string()))?
                    .find(named)
            };
            found.ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
        }
    }
}

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        info!("Initializing CPAL enumerator");
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    pub fn host(&self) -> &cpal::Host {
        &self.host
    }

    fn device_type(device: &cpal::Device) -> Option<DeviceType> {
        let has_input = device
            .supported_input_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);
        let has_output = device
            .supported_output_configs()
            .map(|mut c| c.next().is_some())
            .unwrap_or(false);

        match (has_input, has_output) {
            (true, true) => Some(DeviceType::Duplex),
            (true, false) => Some(DeviceType::Input),
            (false, true) => Some(DeviceType::Output),
            (false, false) => None,
        }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating all audio devices");

        let cpal_devices = self
            .host
            .devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?;

        let mut devices = Vec::new();
        for device in cpal_devices {
            match Self::device_type(&device) {
                Some(device_type) => devices.push(describe(&device, device_type)),
                None => warn!("Skipping device without usable configs: {}", device_name(&device)),
            }
        }

        info!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn default_input_device(&self) -> Result<DeviceInfo> {
        let device = find_device(&self.host, None, DeviceType::Input)?;
        Ok(describe(&device, DeviceType::Input))
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = find_device(&self.host, None, DeviceType::Output)?;
        Ok(describe(&device, DeviceType::Output))
    }
}
