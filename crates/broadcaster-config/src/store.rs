//! Section/key configuration store.
//!
//! Values are kept as strings and converted on access. Each key resolves to
//! the user value if one was set, otherwise to the registered default.
//! Only user values are persisted.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Hierarchical section/key string store with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    values: Sections,
    defaults: Sections,
}

impl ConfigStore {
    /// Store that lives only in memory; saving it is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store backed by `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ConfigError::malformed(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, starting empty");
                Sections::new()
            }
            Err(e) => return Err(ConfigError::io(&path, e)),
        };

        Ok(Self {
            path: Some(path),
            values,
            defaults: Sections::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether no user value has been set in any section.
    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeMap::is_empty)
    }

    pub fn has_user_value(&self, section: &str, key: &str) -> bool {
        self.values
            .get(section)
            .is_some_and(|keys| keys.contains_key(key))
    }

    /// Remove a user value. Returns whether one existed.
    pub fn remove_value(&mut self, section: &str, key: &str) -> bool {
        self.values
            .get_mut(section)
            .is_some_and(|keys| keys.remove(key).is_some())
    }

    fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.values
            .get(section)
            .and_then(|keys| keys.get(key))
            .or_else(|| self.defaults.get(section).and_then(|keys| keys.get(key)))
            .map(String::as_str)
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<&str> {
        self.raw(section, key)
    }

    /// Integer value; missing or unparsable values read as 0.
    pub fn get_int(&self, section: &str, key: &str) -> i64 {
        self.raw(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Unsigned value; missing, negative or unparsable values read as 0.
    pub fn get_uint(&self, section: &str, key: &str) -> u64 {
        self.raw(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// `true`/`1` (any non-zero integer) read as true.
    pub fn get_bool(&self, section: &str, key: &str) -> bool {
        match self.raw(section, key).map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) => v.parse::<i64>().is_ok_and(|n| n != 0),
            None => false,
        }
    }

    pub fn get_double(&self, section: &str, key: &str) -> f64 {
        self.raw(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0)
    }

    fn set_raw(&mut self, section: &str, key: &str, value: String) {
        self.values
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn set_string(&mut self, section: &str, key: &str, value: &str) {
        self.set_raw(section, key, value.to_string());
    }

    pub fn set_int(&mut self, section: &str, key: &str, value: i64) {
        self.set_raw(section, key, value.to_string());
    }

    pub fn set_uint(&mut self, section: &str, key: &str, value: u64) {
        self.set_raw(section, key, value.to_string());
    }

    pub fn set_bool(&mut self, section: &str, key: &str, value: bool) {
        self.set_raw(section, key, value.to_string());
    }

    pub fn set_double(&mut self, section: &str, key: &str, value: f64) {
        self.set_raw(section, key, value.to_string());
    }

    /// Register the value a key resolves to while it has no user value.
    pub fn set_default_string(&mut self, section: &str, key: &str, value: &str) {
        self.defaults
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_default_uint(&mut self, section: &str, key: &str, value: u64) {
        self.set_default_string(section, key, &value.to_string());
    }

    pub fn set_default_bool(&mut self, section: &str, key: &str, value: bool) {
        self.set_default_string(section, key, &value.to_string());
    }

    /// Persist user values: write `<path>.<temp_ext>` then rename it over the file.
    pub fn save_safe(&self, temp_ext: &str) -> ConfigResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| ConfigError::malformed(path, e))?;

        let temp = with_extension_suffix(path, temp_ext);
        fs::write(&temp, text).map_err(|e| ConfigError::io(&temp, e))?;
        fs::rename(&temp, path).map_err(|e| ConfigError::io(path, e))?;

        info!(path = %path.display(), "Saved config");
        Ok(())
    }
}

/// `file.json` + `tmp` -> `file.json.tmp`.
pub(crate) fn with_extension_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
