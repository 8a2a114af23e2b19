//! User set session - saves, downloads, uploads and loads camera settings files.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::device::{FileAccessDevice, UserSetControl};
use crate::engine::ChunkedTransferEngine;
use crate::events::{TracingObserver, TransferObserver};
use crate::progress::ProgressSink;
use crate::selector::FileSelector;

/// Orchestrates the settings file workflow around the transfer engine.
///
/// A download first stores the camera's active settings into the configured
/// user set, then reads the user set file. An upload writes the file and then
/// loads the user set so the camera applies it.
pub struct UserSetSession<D, O = TracingObserver>
where
    D: FileAccessDevice + UserSetControl,
    O: TransferObserver,
{
    engine: ChunkedTransferEngine<D, O>,
}

impl<D, O> UserSetSession<D, O>
where
    D: FileAccessDevice + UserSetControl,
    O: TransferObserver,
{
    pub fn new(engine: ChunkedTransferEngine<D, O>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ChunkedTransferEngine<D, O> {
        &self.engine
    }

    fn selector(&self) -> Result<FileSelector> {
        let name = &self.engine.config().file_selector;
        self.engine
            .resolve(name)
            .with_context(|| format!("Fetching \"{}\" entry from file selector", name))
    }

    /// Download the user set file, saving the active settings into it first
    /// when configured to.
    #[instrument(skip(self, progress))]
    pub fn download_user_set<P: ProgressSink + ?Sized>(
        &mut self,
        progress: &mut P,
    ) -> Result<Vec<u8>> {
        let config = self.engine.config().clone();
        if config.save_before_download {
            self.engine
                .device_mut()
                .save_user_set(&config.user_set)
                .with_context(|| format!("Saving user set {}", config.user_set))?;
            info!(user_set = %config.user_set, "User set saved");
        }

        let selector = self.selector()?;
        let data = self
            .engine
            .download(&selector, None, progress)
            .with_context(|| format!("Downloading {}", selector))?;
        Ok(data)
    }

    /// Upload a user set file and, when configured to, load it into the camera.
    #[instrument(skip(self, data, progress), fields(len = data.len()))]
    pub fn upload_user_set<P: ProgressSink + ?Sized>(
        &mut self,
        data: &[u8],
        progress: &mut P,
    ) -> Result<u64> {
        let selector = self.selector()?;
        let written = self
            .engine
            .upload(&selector, data, progress)
            .with_context(|| format!("Uploading {}", selector))?;

        let config = self.engine.config().clone();
        if config.load_after_upload {
            self.engine
                .device_mut()
                .load_user_set(&config.user_set)
                .with_context(|| format!("Loading user set {}", config.user_set))?;
            info!(user_set = %config.user_set, "User set loaded");
        }
        Ok(written)
    }

    /// Download the user set file and write it to `path`.
    pub fn download_to_file<P: ProgressSink + ?Sized>(
        &mut self,
        path: impl AsRef<Path>,
        progress: &mut P,
    ) -> Result<u64> {
        let path = path.as_ref();
        let data = self.download_user_set(progress)?;
        std::fs::write(path, &data)
            .with_context(|| format!("Saving user set file to {}", path.display()))?;
        info!(path = %path.display(), bytes = data.len(), "Saved user set file");
        Ok(data.len() as u64)
    }

    /// Read a previously saved settings file from `path` and upload it.
    pub fn upload_from_file<P: ProgressSink + ?Sized>(
        &mut self,
        path: impl AsRef<Path>,
        progress: &mut P,
    ) -> Result<u64> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading settings file");
        let data = std::fs::read(path)
            .with_context(|| format!("Reading settings file {}", path.display()))?;
        self.upload_user_set(&data, progress)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TransferConfig;
    use crate::device::SimulatedDevice;
    use crate::error::TransferError;
    use crate::events::NullObserver;
    use crate::progress::NoProgress;

    fn session(
        device: SimulatedDevice,
        config: TransferConfig,
    ) -> UserSetSession<SimulatedDevice, NullObserver> {
        UserSetSession::new(
            ChunkedTransferEngine::with_observer(device, Arc::new(NullObserver)).with_config(config),
        )
    }

    #[test]
    fn test_download_saves_active_settings() {
        let settings: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let device = SimulatedDevice::new(64).with_settings(settings.clone());
        let mut session = session(device, TransferConfig::default());

        let data = session.download_user_set(&mut NoProgress).unwrap();
        assert_eq!(data, settings);
    }

    #[test]
    fn test_download_without_save_reports_no_data() {
        let config = TransferConfig {
            save_before_download: false,
            ..Default::default()
        };
        let device = SimulatedDevice::new(64).with_settings(vec![1, 2, 3]);
        let mut session = session(device, config);

        let err = session.download_user_set(&mut NoProgress).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransferError>(),
            Some(TransferError::NoDataAvailable { .. })
        ));
    }

    #[test]
    fn test_upload_loads_user_set() {
        let mut session = session(SimulatedDevice::new(64), TransferConfig::default());
        let blob = b"ExposureTime=2000\nGain=3.5\n".to_vec();

        let written = session.upload_user_set(&blob, &mut NoProgress).unwrap();
        assert_eq!(written, blob.len() as u64);

        let device = session.engine().device();
        assert_eq!(device.file("UserSet0").unwrap(), blob.as_slice());
        assert_eq!(device.settings(), blob.as_slice());
    }

    #[test]
    fn test_upload_to_other_slot_without_load() {
        let config = TransferConfig {
            file_selector: "UserSet1".into(),
            load_after_upload: false,
            ..Default::default()
        };
        let device = SimulatedDevice::new(64).with_settings(b"active".to_vec());
        let mut session = session(device, config);

        session.upload_user_set(b"saved", &mut NoProgress).unwrap();
        let device = session.engine().device();
        assert_eq!(device.file("UserSet1").unwrap(), b"saved");
        assert_eq!(device.settings(), b"active");
    }

    #[test]
    fn test_unknown_selector_has_context() {
        let config = TransferConfig {
            file_selector: "UserFile7".into(),
            ..Default::default()
        };
        let mut session = session(SimulatedDevice::new(64), config);
        let err = session.upload_user_set(b"data", &mut NoProgress).unwrap_err();
        assert!(err.to_string().contains("UserFile7"));
        assert!(matches!(
            err.downcast_ref::<TransferError>(),
            Some(TransferError::SelectorUnsupported { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir();
        let source = dir.join(format!("camfile-session-src-{}.bin", std::process::id()));
        let target = dir.join(format!("camfile-session-dst-{}.bin", std::process::id()));
        let blob: Vec<u8> = (0..777u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &blob).unwrap();

        let mut session = session(SimulatedDevice::new(128), TransferConfig::default());
        session.upload_from_file(&source, &mut NoProgress).unwrap();
        let read = session.download_to_file(&target, &mut NoProgress).unwrap();

        let saved = std::fs::read(&target).unwrap();
        std::fs::remove_file(&source).unwrap();
        std::fs::remove_file(&target).unwrap();

        assert_eq!(read, blob.len() as u64);
        assert_eq!(saved, blob);
    }
}
