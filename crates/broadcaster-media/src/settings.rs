//! Key/value settings blobs passed to engine objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A settings blob for encoders, outputs and services.
///
/// Values are typed JSON scalars or nested blobs. Setters overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Create an empty blob.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.values.insert(key.to_string(), Value::from(value));
        self
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.values.insert(key.to_string(), Value::Bool(value));
        self
    }

    pub fn set_double(&mut self, key: &str, value: f64) -> &mut Self {
        self.values.insert(key.to_string(), Value::from(value));
        self
    }

    pub fn set_obj(&mut self, key: &str, value: Settings) -> &mut Self {
        self.values.insert(key.to_string(), Value::Object(value.values));
        self
    }

    /// Set `key` only if it is not present yet.
    pub fn set_default_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        if !self.values.contains_key(key) {
            self.set_string(key, value);
        }
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_obj(&self, key: &str) -> Option<Settings> {
        match self.values.get(key) {
            Some(Value::Object(map)) => Some(Settings { values: map.clone() }),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Overlay every key of `other` onto this blob.
    pub fn merge(&mut self, other: &Settings) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over keys in insertion-independent (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_round_trip_through_setters() {
        let mut settings = Settings::new();
        settings
            .set_string("rate_control", "CBR")
            .set_int("bitrate", 2500)
            .set_bool("use_bufsize", true)
            .set_double("KeyframeInterval", 2.0);

        assert_eq!(settings.get_string("rate_control"), Some("CBR"));
        assert_eq!(settings.get_int("bitrate"), Some(2500));
        assert_eq!(settings.get_bool("use_bufsize"), Some(true));
        assert_eq!(settings.get_double("KeyframeInterval"), Some(2.0));
        assert_eq!(settings.get_int("rate_control"), None);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = Settings::new();
        base.set_int("bitrate", 6000).set_string("profile", "main");

        let mut overlay = Settings::new();
        overlay.set_int("bitrate", 2500);

        base.merge(&overlay);
        assert_eq!(base.get_int("bitrate"), Some(2500));
        assert_eq!(base.get_string("profile"), Some("main"));
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut settings = Settings::new();
        settings.set_string("type", "rtmp_custom");
        settings.set_default_string("type", "rtmp_common");
        assert_eq!(settings.get_string("type"), Some("rtmp_custom"));
    }
}
