//! Persisted service descriptor.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use broadcaster_media::Settings;

use crate::error::{ConfigError, ConfigResult};
use crate::store::with_extension_suffix;

/// Streaming destination as saved on disk: service type plus its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDocument {
    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkeys: Option<Settings>,
}

impl ServiceDocument {
    pub fn new(service_type: impl Into<String>, settings: Settings) -> Self {
        Self {
            service_type: service_type.into(),
            settings,
            hotkeys: None,
        }
    }

    /// Write through `<path>.<temp_ext>`, keeping the previous file as
    /// `<path>.<backup_ext>`.
    pub fn save_json_safe(&self, path: &Path, temp_ext: &str, backup_ext: &str) -> ConfigResult<()> {
        let text =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::malformed(path, e))?;

        let temp = with_extension_suffix(path, temp_ext);
        fs::write(&temp, text).map_err(|e| ConfigError::io(&temp, e))?;

        if path.exists() {
            let backup = with_extension_suffix(path, backup_ext);
            fs::rename(path, &backup).map_err(|e| ConfigError::io(&backup, e))?;
        }
        fs::rename(&temp, path).map_err(|e| ConfigError::io(path, e))?;

        info!(path = %path.display(), service_type = %self.service_type, "Saved service");
        Ok(())
    }

    /// Load the document, falling back to `<path>.<backup_ext>` when the
    /// primary file is missing or unreadable. `None` if neither loads.
    pub fn load_json_safe(path: &Path, backup_ext: &str) -> Option<Self> {
        match Self::load(path) {
            Ok(doc) => return Some(doc),
            Err(e) if path.exists() => warn!(error = %e, "Service document unreadable, trying backup"),
            Err(_) => {}
        }

        let backup = with_extension_suffix(path, backup_ext);
        match Self::load(&backup) {
            Ok(doc) => Some(doc),
            Err(e) => {
                if backup.exists() {
                    warn!(error = %e, "Service backup unreadable");
                }
                None
            }
        }
    }

    fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::malformed(path, e))
    }
}
