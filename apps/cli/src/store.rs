//! Directory-backed state for the simulated camera.
//!
//! Each file slot is kept as `<slot>.bin` and the camera's active settings
//! as `settings.bin`, so consecutive runs see the same device.

use std::path::Path;

use anyhow::{Context, Result};
use camfile_core::SimulatedDevice;
use tracing::debug;

const SETTINGS_FILE: &str = "settings.bin";

/// Build a simulated camera from the contents of `dir`.
pub fn load(dir: &Path, buffer_capacity: usize) -> Result<SimulatedDevice> {
    let mut device = SimulatedDevice::new(buffer_capacity);
    if !dir.exists() {
        debug!(dir = %dir.display(), "No camera store yet, starting empty");
        return Ok(device);
    }

    let settings = dir.join(SETTINGS_FILE);
    if settings.exists() {
        let data = std::fs::read(&settings)
            .with_context(|| format!("Reading {}", settings.display()))?;
        device = device.with_settings(data);
    }

    for entry in std::fs::read_dir(dir).with_context(|| format!("Listing {}", dir.display()))? {
        let path = entry?.path();
        let is_slot = path.extension().is_some_and(|ext| ext == "bin")
            && path.file_name().is_some_and(|name| name != SETTINGS_FILE);
        if !is_slot {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
            let data = std::fs::read(&path).with_context(|| format!("Reading {}", path.display()))?;
            debug!(slot = name, bytes = data.len(), "Loaded slot");
            device.store_file(name, data);
        }
    }
    Ok(device)
}

/// Persist the simulated camera's slots and settings into `dir`.
pub fn save(dir: &Path, device: &SimulatedDevice) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    for (name, data) in device.files() {
        let path = dir.join(format!("{}.bin", name));
        std::fs::write(&path, data).with_context(|| format!("Writing {}", path.display()))?;
    }
    std::fs::write(dir.join(SETTINGS_FILE), device.settings())
        .with_context(|| format!("Writing settings into {}", dir.display()))?;
    Ok(())
}
