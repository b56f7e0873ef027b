//! Session settings consumed by the session engine.
//!
//! Settings are owned outside the core (the config file, an admin panel) and
//! may be incomplete or wrong. The engine must stay playable, so anything
//! unusable is replaced by a default instead of surfacing as an error.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::reward::{RewardBand, RewardTable};

pub const DEFAULT_ATTEMPTS_PER_SESSION: u32 = 3;
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 60;

/// Validated, read-only session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    attempts_per_session: u32,
    cooldown_minutes: u32,
    reward_table: RewardTable,
}

impl SessionSettings {
    /// Build settings, substituting defaults for zero counts and empty bands.
    pub fn new(attempts_per_session: u32, cooldown_minutes: u32, bands: &[RewardBand]) -> Self {
        RawSessionSettings {
            attempts_per_session: Some(attempts_per_session),
            cooldown_minutes: Some(cooldown_minutes),
            reward_bands: Some(bands.to_vec()),
        }
        .sanitize()
    }

    pub fn attempts_per_session(&self) -> u32 {
        self.attempts_per_session
    }

    pub fn cooldown_minutes(&self) -> u32 {
        self.cooldown_minutes
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }

    pub fn reward_table(&self) -> &RewardTable {
        &self.reward_table
    }

    pub fn resolve_reward(&self, offset_ms: u32) -> u32 {
        self.reward_table.resolve(offset_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            attempts_per_session: DEFAULT_ATTEMPTS_PER_SESSION,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            reward_table: RewardTable::default(),
        }
    }
}

/// Settings as they arrive from an external owner; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSessionSettings {
    #[serde(default)]
    pub attempts_per_session: Option<u32>,
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
    #[serde(default)]
    pub reward_bands: Option<Vec<RewardBand>>,
}

impl RawSessionSettings {
    pub fn sanitize(self) -> SessionSettings {
        let attempts_per_session = match self.attempts_per_session {
            Some(n) if n > 0 => n,
            other => {
                tracing::warn!(value = ?other, "attempts_per_session unusable, using default");
                DEFAULT_ATTEMPTS_PER_SESSION
            }
        };
        let cooldown_minutes = match self.cooldown_minutes {
            Some(n) if n > 0 => n,
            other => {
                tracing::warn!(value = ?other, "cooldown_minutes unusable, using default");
                DEFAULT_COOLDOWN_MINUTES
            }
        };
        let reward_table = match self.reward_bands {
            Some(bands) if !bands.is_empty() => RewardTable::new(&bands),
            _ => RewardTable::default(),
        };
        SessionSettings {
            attempts_per_session,
            cooldown_minutes,
            reward_table,
        }
    }
}

/// Read-only provider of session settings.
pub trait SettingsSource: Send + Sync {
    /// Always yields usable settings.
    fn session_settings(&self) -> SessionSettings;
}

impl SettingsSource for SessionSettings {
    fn session_settings(&self) -> SessionSettings {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let settings = SessionSettings::new(0, 0, &[]);
        assert_eq!(settings.attempts_per_session(), DEFAULT_ATTEMPTS_PER_SESSION);
        assert_eq!(settings.cooldown_minutes(), DEFAULT_COOLDOWN_MINUTES);
        assert!(settings.reward_table().is_default());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let raw: RawSessionSettings = serde_json::from_str(r#"{"cooldown_minutes": 5}"#).unwrap();
        let settings = raw.sanitize();
        assert_eq!(settings.attempts_per_session(), DEFAULT_ATTEMPTS_PER_SESSION);
        assert_eq!(settings.cooldown_minutes(), 5);
        assert_eq!(settings.cooldown(), Duration::minutes(5));
        assert_eq!(settings.resolve_reward(0), 33);
    }

    #[test]
    fn custom_bands_are_kept() {
        let settings = SessionSettings::new(5, 10, &[RewardBand::new(0, None, 1)]);
        assert!(!settings.reward_table().is_default());
        assert_eq!(settings.resolve_reward(400), 1);
    }
}
