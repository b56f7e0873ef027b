//! TOML-based application configuration.
//!
//! Stores:
//! - Game rules (attempts per session, cooldown, reward bands)
//! - The default player id used by the CLI
//! - Clock display refresh interval
//! - Log filter
//!
//! Configuration is stored at `~/.config/wholesecond/config.toml`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::DEFAULT_SAMPLE_INTERVAL_MS;
use crate::error::ConfigError;
use crate::reward::{default_bands, RewardBand};
use crate::settings::{
    RawSessionSettings, SessionSettings, SettingsSource, DEFAULT_ATTEMPTS_PER_SESSION,
    DEFAULT_COOLDOWN_MINUTES,
};

/// Game rule configuration.
///
/// Every field is read on its own: an unreadable value falls back to the
/// field's zero value, which [`RawSessionSettings::sanitize`] then replaces
/// with the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_attempts_per_session", deserialize_with = "lenient")]
    pub attempts_per_session: u32,
    #[serde(default = "default_cooldown_minutes", deserialize_with = "lenient")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_bands", deserialize_with = "lenient")]
    pub reward_bands: Vec<RewardBand>,
}

/// Player configuration.
///
/// An empty `default_id` means none is configured; it is never regenerated
/// for an existing file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub default_id: String,
}

/// Clock display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// `0` selects the default interval.
    #[serde(default = "default_sample_interval_ms", deserialize_with = "lenient")]
    pub sample_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `wholesecond_core=debug`.
    /// Empty selects the default.
    #[serde(default = "default_log_filter", deserialize_with = "lenient")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/wholesecond/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "lenient")]
    pub game: GameConfig,
    #[serde(default, deserialize_with = "lenient")]
    pub player: PlayerConfig,
    #[serde(default, deserialize_with = "lenient")]
    pub clock: ClockConfig,
    #[serde(default, deserialize_with = "lenient")]
    pub logging: LoggingConfig,
}

/// Deserialize `T`, replacing an unreadable value with `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable config value, using default");
        T::default()
    }))
}

fn default_attempts_per_session() -> u32 {
    DEFAULT_ATTEMPTS_PER_SESSION
}
fn default_cooldown_minutes() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}
fn default_sample_interval_ms() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.into()
}

const DEFAULT_LOG_FILTER: &str = "warn";

/// Keys checked by [`Config::unreadable_fields`], with the check for each.
const CHECKED_FIELDS: [(&str, &str, fn(toml::Value) -> Result<(), toml::de::Error>); 6] = [
    ("game", "attempts_per_session", |v| v.try_into::<u32>().map(drop)),
    ("game", "cooldown_minutes", |v| v.try_into::<u32>().map(drop)),
    ("game", "reward_bands", |v| v.try_into::<Vec<RewardBand>>().map(drop)),
    ("player", "default_id", |v| v.try_into::<String>().map(drop)),
    ("clock", "sample_interval_ms", |v| v.try_into::<u64>().map(drop)),
    ("logging", "filter", |v| v.try_into::<String>().map(drop)),
];

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            attempts_per_session: default_attempts_per_session(),
            cooldown_minutes: default_cooldown_minutes(),
            reward_bands: default_bands(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    /// Defaults for a new file, including a freshly generated player id.
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            player: PlayerConfig {
                default_id: uuid::Uuid::new_v4().to_string(),
            },
            clock: ClockConfig::default(),
            logging: LoggingConfig::default(),
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

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
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create and save the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Like [`Config::load`], for an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
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

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// into the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json.clone()).map_err(|e| invalid(e.to_string()))?;

        // Loading is lenient; setting is not. A value that didn't survive the
        // round trip was replaced by a default.
        let applied = serde_json::to_value(&updated).map_err(|e| invalid(e.to_string()))?;
        if Self::get_json_value_by_path(&applied, key) != Self::get_json_value_by_path(&json, key) {
            return Err(invalid(format!("'{value}' is not a valid value")));
        }
        *self = updated;
        Ok(())
    }

    /// Problems in the file at `path` that were replaced by defaults on load.
    ///
    /// A missing file has none.
    pub fn unreadable_fields(path: &Path) -> Result<Vec<String>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        let root: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut problems = Vec::new();
        let mut bad_sections: Vec<&str> = Vec::new();
        for (section, field, check) in CHECKED_FIELDS {
            let Some(value) = root.get(section) else { continue };
            let Some(table) = value.as_table() else {
                if !bad_sections.contains(&section) {
                    bad_sections.push(section);
                    problems.push(format!("{section}: expected a table"));
                }
                continue;
            };
            if let Some(value) = table.get(field) {
                if let Err(e) = check(value.clone()) {
                    problems.push(format!("{section}.{field}: {e}"));
                }
            }
        }
        Ok(problems)
    }

    /// Refresh interval for the clock display.
    pub fn sample_interval_ms(&self) -> u64 {
        match self.clock.sample_interval_ms {
            0 => DEFAULT_SAMPLE_INTERVAL_MS,
            n => n,
        }
    }

    /// Log filter directive.
    pub fn log_filter(&self) -> &str {
        match self.logging.filter.trim() {
            "" => DEFAULT_LOG_FILTER,
            filter => filter,
        }
    }

    /// Configured default player, if any.
    pub fn default_player_id(&self) -> Option<&str> {
        match self.player.default_id.trim() {
            "" => None,
            id => Some(id),
        }
    }
}

impl SettingsSource for Config {
    fn session_settings(&self) -> SessionSettings {
        RawSessionSettings {
            attempts_per_session: Some(self.game.attempts_per_session),
            cooldown_minutes: Some(self.game.cooldown_minutes),
            reward_bands: Some(self.game.reward_bands.clone()),
        }
        .sanitize()
    }
}
