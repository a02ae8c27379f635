//! Data directory configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Configuration file name within the data directory.
pub const CONFIG_FILE: &str = "config.yml";

/// Configuration stored in `<data_dir>/config.yml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataDirConfig {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Store settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Automatic follow-up settings.
    #[serde(default)]
    pub resumer: ResumerSettings,
}

fn default_version() -> u32 {
    1
}

impl Default for DataDirConfig {
    fn default() -> Self {
        Self {
            version: 1,
            store: StoreSettings::default(),
            resumer: ResumerSettings::default(),
        }
    }
}

impl DataDirConfig {
    /// Load the config for `data_dir`, falling back to defaults if the file is absent.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write this config into `data_dir`.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub fn save(&self, data_dir: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(data_dir.as_ref().join(CONFIG_FILE), content)?;
        Ok(())
    }
}

/// Index file and reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSettings {
    /// Name of the JSON index file holding every work item.
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Window over which filesystem events are coalesced into one reload.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_index_file() -> String {
    "works.json".to_string()
}

const fn default_debounce_ms() -> u64 {
    100
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl StoreSettings {
    /// Name of the advisory lock file that sits next to the index.
    #[must_use]
    pub fn lock_file(&self) -> String {
        format!("{}.lock", self.index_file)
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Limits for automatic nudges and reactivation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumerSettings {
    /// Continuation messages sent per session before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before concluding that an idle agent has stalled.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_settle_delay_ms() -> u64 {
    2000
}

impl Default for ResumerSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl ResumerSettings {
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
