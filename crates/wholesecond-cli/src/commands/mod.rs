pub mod attempt;
pub mod config;
pub mod play;
pub mod session;

use serde::Serialize;
use wholesecond_core::{Config, ConfigError, CoreError, Database, PlayerId, SessionService};

/// Shared state for one CLI invocation.
pub struct Context {
    config: Config,
    player: Option<String>,
}

impl Context {
    pub fn new(config: Config, player: Option<String>) -> Self {
        Self { config, player }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `--player`, else the configured default.
    pub fn player(&self) -> Result<PlayerId, CoreError> {
        match (&self.player, self.config.default_player_id()) {
            (Some(raw), _) => Ok(PlayerId::new(raw.as_str())?),
            (None, Some(id)) => Ok(PlayerId::new(id)?),
            (None, None) => Err(ConfigError::InvalidValue {
                key: "player.default_id".into(),
                message: "not set; pass --player or run `wholesecond config set player.default_id <id>`"
                    .into(),
            }
            .into()),
        }
    }

    pub fn service(&self) -> Result<SessionService<Database>, CoreError> {
        Ok(SessionService::new(Database::open()?, self.config.clone()))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
