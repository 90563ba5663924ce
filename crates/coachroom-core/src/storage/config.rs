//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Which coaching topics are enabled
//! - The daily push notification budget
//! - Where the key-value database lives
//!
//! Configuration is stored at `~/.config/coachroom/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::generator::Preferences;
use crate::message::Topic;

/// Coaching preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_enabled_topics")]
    pub enabled_topics: Vec<Topic>,
    #[serde(default = "default_max_push_per_day")]
    pub max_push_per_day: u32,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file name, relative to the data directory unless absolute.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/coachroom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_enabled_topics() -> Vec<Topic> {
    Topic::ALL.to_vec()
}
fn default_max_push_per_day() -> u32 {
    3
}
fn default_database_file() -> String {
    "coachroom.db".into()
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            enabled_topics: default_enabled_topics(),
            max_push_per_day: default_max_push_per_day(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Array(_) => {
                        let items = value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(|s| serde_json::Value::String(s.to_lowercase()))
                            .collect();
                        serde_json::Value::Array(items)
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value does not fit the
    /// key's type, or saving fails.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a config value in memory only.
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Absolute path of the key-value database.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let file = PathBuf::from(&self.storage.database_file);
        if file.is_absolute() {
            Ok(file)
        } else {
            Ok(data_dir()?.join(file))
        }
    }

    /// Generator preferences derived from this config.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            enabled_topics: self.preferences.enabled_topics.iter().copied().collect(),
            max_push_per_day: self.preferences.max_push_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_topic() {
        let cfg = Config::default();
        assert_eq!(cfg.preferences.enabled_topics.len(), Topic::ALL.len());
        assert_eq!(cfg.preferences.max_push_per_day, 3);
    }

    #[test]
    fn partial_toml_keeps_field_defaults() {
        let cfg: Config = toml::from_str("[preferences]\nmax_push_per_day = 5\n").unwrap();
        assert_eq!(cfg.preferences.max_push_per_day, 5);
        assert_eq!(cfg.preferences.enabled_topics.len(), 8);
        assert_eq!(cfg.storage.database_file, "coachroom.db");
    }

    #[test]
    fn get_by_dotted_key() {
        let cfg = Config::default();
        assert_eq!(cfg.get("preferences.max_push_per_day").as_deref(), Some("3"));
        assert!(cfg.get("preferences.nope").is_none());
    }

    #[test]
    fn apply_updates_number_and_list() {
        let mut cfg = Config::default();
        cfg.apply("preferences.max_push_per_day", "1").unwrap();
        cfg.apply("preferences.enabled_topics", "Hydration, sleep").unwrap();
        assert_eq!(cfg.preferences.max_push_per_day, 1);
        assert_eq!(cfg.preferences.enabled_topics, vec![Topic::Hydration, Topic::Sleep]);
    }

    #[test]
    fn apply_rejects_unknown_topic_and_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("preferences.enabled_topics", "coffee"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(cfg.apply("ui.theme", "dark"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.apply("preferences.max_push_per_day", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
