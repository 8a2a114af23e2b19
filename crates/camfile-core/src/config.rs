//! Transfer configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::selector::USER_SET_0;

/// Configuration for file access transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// File selector entry to transfer.
    pub file_selector: String,
    /// User set saved before a download and loaded after an upload.
    pub user_set: String,
    /// Raise the access length to the buffer capacity before transferring.
    pub widen_window: bool,
    /// Save the camera's active settings into the user set before downloading.
    pub save_before_download: bool,
    /// Load the user set after a successful upload.
    pub load_after_upload: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            file_selector: USER_SET_0.to_string(),
            user_set: USER_SET_0.to_string(),
            widen_window: true,
            save_before_download: true,
            load_after_upload: true,
        }
    }
}

impl TransferConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TransferConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TransferConfig = toml::from_str(
            r#"
            file_selector = "UserSet1"
            widen_window = false
            "#,
        )
        .unwrap();

        assert_eq!(config.file_selector, "UserSet1");
        assert!(!config.widen_window);
        assert_eq!(config.user_set, "UserSet0");
        assert!(config.save_before_download);
        assert!(config.load_after_upload);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("camfile-config-{}.toml", std::process::id()));
        let config = TransferConfig {
            user_set: "UserSet2".into(),
            save_before_download: false,
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = TransferConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }
}
