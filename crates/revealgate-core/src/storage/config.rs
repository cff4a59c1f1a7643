//! TOML-based session configuration.
//!
//! Holds the tunables of the reveal flow:
//! - Code length and how long the code stays on screen
//! - Unlock delay and countdown pacing
//! - The payload and how long it stays revealed
//! - An optional RNG seed for reproducible codes
//!
//! Configuration is stored at `~/.config/revealgate/config.toml`, or under
//! `$REVEALGATE_CONFIG_DIR` when that is set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config_dir;
use crate::challenge::MAX_CODE_DIGITS;
use crate::error::{ConfigError, Result};

/// Upper bound for every delay, one day.
pub const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

/// Reveal flow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealConfig {
    #[serde(default = "default_code_digits")]
    pub code_digits: u8,
    #[serde(default = "default_code_display_secs")]
    pub code_display_secs: u64,
    #[serde(default = "default_unlock_delay_secs")]
    pub unlock_delay_secs: u64,
    #[serde(default = "default_countdown_start")]
    pub countdown_start: u32,
    #[serde(default = "default_countdown_interval_ms")]
    pub countdown_interval_ms: u64,
    #[serde(default = "default_message_clear_secs")]
    pub message_clear_secs: u64,
    #[serde(default = "default_payload")]
    pub payload: String,
    /// Fixed RNG seed. Codes come from OS entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

// Default functions
fn default_code_digits() -> u8 {
    4
}
fn default_code_display_secs() -> u64 {
    2
}
fn default_unlock_delay_secs() -> u64 {
    15
}
fn default_countdown_start() -> u32 {
    15
}
fn default_countdown_interval_ms() -> u64 {
    1000
}
fn default_message_clear_secs() -> u64 {
    3
}
fn default_payload() -> String {
    "I may be slightly autistic".into()
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            code_digits: default_code_digits(),
            code_display_secs: default_code_display_secs(),
            unlock_delay_secs: default_unlock_delay_secs(),
            countdown_start: default_countdown_start(),
            countdown_interval_ms: default_countdown_interval_ms(),
            message_clear_secs: default_message_clear_secs(),
            payload: default_payload(),
            seed: None,
        }
    }
}

impl RevealConfig {
    pub fn code_display(&self) -> Duration {
        Duration::from_secs(self.code_display_secs)
    }

    pub fn unlock_delay(&self) -> Duration {
        Duration::from_secs(self.unlock_delay_secs)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }

    pub fn message_clear(&self) -> Duration {
        Duration::from_secs(self.message_clear_secs)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CODE_DIGITS).contains(&self.code_digits) {
            return Err(ConfigError::InvalidValue {
                key: "code_digits".into(),
                message: format!("must be between 1 and {MAX_CODE_DIGITS}"),
            });
        }
        if self.countdown_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "countdown_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.unlock_delay_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "unlock_delay_secs".into(),
                message: "must be greater than zero".into(),
            });
        }

        let delays = [
            ("code_display_secs", self.code_display()),
            ("unlock_delay_secs", self.unlock_delay()),
            ("countdown_interval_ms", self.countdown_interval()),
            ("message_clear_secs", self.message_clear()),
        ];
        let max = Duration::from_secs(MAX_DELAY_SECS);
        if let Some((key, _)) = delays.iter().find(|(_, delay)| *delay > max) {
            return Err(ConfigError::InvalidValue {
                key: (*key).into(),
                message: format!("must be at most {MAX_DELAY_SECS} seconds"),
            });
        }
        Ok(())
    }

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
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                // Numbers are nullable only where the field is an Option; "none" unsets them.
                serde_json::Value::Number(_) | serde_json::Value::Null
                    if value.eq_ignore_ascii_case("none") =>
                {
                    serde_json::Value::Null
                }
                serde_json::Value::Number(_) | serde_json::Value::Null => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: RevealConfig = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(format!("{}: {e}", path.display())))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some("none".into()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. The result is validated before it is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. `self` is left untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: RevealConfig = serde_json::from_value(json).map_err(|e| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
