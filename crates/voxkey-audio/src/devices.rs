//! Input device enumeration and lookup.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::warn;

use voxkey_core::error::{Result, VoxkeyError};

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| VoxkeyError::Audio(format!("Failed to enumerate input devices: {}", e)))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Whether an input device with the given name is currently present.
///
/// Used by the startup microphone check: a configured device that went
/// missing falls back to the system default with a notification.
pub fn is_device_available(name: &str) -> bool {
    match list_input_devices() {
        Ok(names) => names.iter().any(|n| n == name),
        Err(e) => {
            warn!(error = %e, "Device enumeration failed");
            false
        }
    }
}

/// Find an input device by case-insensitive name substring.
pub fn find_input_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    let name_lower = name.to_lowercase();
    host.input_devices()
        .map_err(|e| VoxkeyError::Audio(format!("Failed to enumerate input devices: {}", e)))?
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&name_lower))
                .unwrap_or(false)
        })
        .ok_or_else(|| VoxkeyError::DeviceUnavailable {
            device: name.to_string(),
        })
}
