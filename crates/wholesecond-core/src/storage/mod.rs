//! Persistence for session state and the attempt ledger.
//!
//! Two implementations share one contract:
//! - [`MemoryStore`] for tests and embedding
//! - [`Database`] backed by SQLite at `~/.config/wholesecond/wholesecond.db`

mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{ClockConfig, Config, GameConfig, LoggingConfig, PlayerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{ConfigError, StoreError};
use crate::ledger::Attempt;
use crate::player::PlayerId;
use crate::session::SessionState;

/// Store-facing contract of the session engine.
///
/// Reads outside a transaction are snapshots. Everything that mutates a
/// player's row goes through [`SessionStore::begin`], which grants exclusive
/// access to that player until the transaction is committed or dropped.
pub trait SessionStore: Send + Sync {
    type Txn<'a>: SessionTxn
    where
        Self: 'a;

    /// Snapshot read; `None` if the player has never been seen.
    fn get_session_state(&self, player: &PlayerId) -> Result<Option<SessionState>, StoreError>;

    /// Most recent attempts for `player`, newest first, across all sessions.
    fn list_recent_attempts(
        &self,
        player: &PlayerId,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError>;

    /// Start an exclusive write transaction for `player`.
    fn begin(&self, player: &PlayerId) -> Result<Self::Txn<'_>, StoreError>;
}

/// Exclusive write access to one player's row.
///
/// Dropping a transaction without calling [`SessionTxn::commit`] discards
/// every write made through it.
pub trait SessionTxn {
    /// Current state as seen inside the transaction.
    fn session_state(&mut self) -> Result<Option<SessionState>, StoreError>;

    /// Append an attempt and store `updated` as one unit.
    fn persist_accepted_attempt(
        &mut self,
        offset_ms: u32,
        created_at: DateTime<Utc>,
        updated: &SessionState,
    ) -> Result<Attempt, StoreError>;

    /// Overwrite the session row (administrative reset).
    fn write_state(&mut self, state: &SessionState) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

/// Returns `~/.config/wholesecond[-dev]/` based on WHOLESECOND_ENV.
///
/// WHOLESECOND_HOME overrides the location entirely; WHOLESECOND_ENV=dev
/// selects the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = if let Some(home) = std::env::var_os("WHOLESECOND_HOME") {
        PathBuf::from(home)
    } else {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config");
        let env = std::env::var("WHOLESECOND_ENV").unwrap_or_else(|_| "production".to_string());
        if env == "dev" {
            base_dir.join("wholesecond-dev")
        } else {
            base_dir.join("wholesecond")
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
