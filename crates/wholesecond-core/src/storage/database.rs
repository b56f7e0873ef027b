//! SQLite-backed session storage.
//!
//! Provides persistent storage for:
//! - One session row per player
//! - The append-only attempt ledger
//!
//! Write transactions use `BEGIN IMMEDIATE`, so they also serialize against
//! other processes sharing the same database file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations, SessionStore, SessionTxn};
use crate::error::{CoreError, StoreError};
use crate::ledger::Attempt;
use crate::player::PlayerId;
use crate::session::SessionState;

/// How long a writer waits for another process's lock before failing.
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// SQLite database for session storage.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/wholesecond/wholesecond.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened,
    /// or migration fails.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("wholesecond.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Total attempts ever recorded for `player`.
    pub fn count_attempts(&self, player: &PlayerId) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM attempts WHERE player_id = ?1",
            params![player.as_str()],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }
}

impl SessionStore for Database {
    type Txn<'a> = DatabaseTxn<'a>;

    fn get_session_state(&self, player: &PlayerId) -> Result<Option<SessionState>, StoreError> {
        let conn = self.lock()?;
        read_state(&conn, player)
    }

    fn list_recent_attempts(
        &self,
        player: &PlayerId,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, offset_ms, created_at
             FROM attempts
             WHERE player_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![player.as_str(), limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut attempts = Vec::new();
        for row in rows {
            let (id, offset_ms, created_at) = row?;
            attempts.push(Attempt {
                id,
                player_id: player.clone(),
                offset_ms,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(attempts)
    }

    fn begin(&self, player: &PlayerId) -> Result<DatabaseTxn<'_>, StoreError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(DatabaseTxn {
            conn,
            player: player.clone(),
            finished: false,
        })
    }
}

/// `BEGIN IMMEDIATE` transaction; rolled back on drop unless committed.
pub struct DatabaseTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    player: PlayerId,
    finished: bool,
}

impl DatabaseTxn<'_> {
    fn upsert_state(&self, state: &SessionState) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sessions
                (player_id, attempts_remaining, last_attempt_at, best_offset_ms, best_reward, revision, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(player_id) DO UPDATE SET
                attempts_remaining = excluded.attempts_remaining,
                last_attempt_at    = excluded.last_attempt_at,
                best_offset_ms     = excluded.best_offset_ms,
                best_reward        = excluded.best_reward,
                revision           = excluded.revision,
                updated_at         = excluded.updated_at",
            params![
                self.player.as_str(),
                state.attempts_remaining,
                state.last_attempt_at.map(format_timestamp),
                state.best_offset_ms,
                state.best_reward,
                state.revision,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }
}

impl SessionTxn for DatabaseTxn<'_> {
    fn session_state(&mut self) -> Result<Option<SessionState>, StoreError> {
        read_state(&self.conn, &self.player)
    }

    fn persist_accepted_attempt(
        &mut self,
        offset_ms: u32,
        created_at: DateTime<Utc>,
        updated: &SessionState,
    ) -> Result<Attempt, StoreError> {
        self.conn.execute(
            "INSERT INTO attempts (player_id, offset_ms, created_at) VALUES (?1, ?2, ?3)",
            params![self.player.as_str(), offset_ms, format_timestamp(created_at)],
        )?;
        let id = self.conn.last_insert_rowid();
        self.upsert_state(updated)?;
        Ok(Attempt {
            id,
            player_id: self.player.clone(),
            offset_ms,
            created_at,
        })
    }

    fn write_state(&mut self, state: &SessionState) -> Result<(), StoreError> {
        self.upsert_state(state)
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for DatabaseTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!(player = %self.player, error = %e, "rollback failed");
            }
        }
    }
}

fn read_state(conn: &Connection, player: &PlayerId) -> Result<Option<SessionState>, StoreError> {
    let row = conn
        .query_row(
            "SELECT attempts_remaining, last_attempt_at, best_offset_ms, best_reward, revision
             FROM sessions
             WHERE player_id = ?1",
            params![player.as_str()],
            raw_state,
        )
        .optional()?;

    row.map(
        |(attempts_remaining, last_attempt_at, best_offset_ms, best_reward, revision)|
         -> Result<SessionState, StoreError> {
            Ok(SessionState {
                attempts_remaining,
                last_attempt_at: last_attempt_at.as_deref().map(parse_timestamp).transpose()?,
                best_offset_ms,
                best_reward,
                revision,
            })
        },
    )
    .transpose()
}

type RawState = (u32, Option<String>, Option<u32>, u32, u64);

fn raw_state(row: &Row<'_>) -> rusqlite::Result<RawState> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SessionSettings;

    fn player() -> PlayerId {
        PlayerId::new("p1").unwrap()
    }

    #[test]
    fn persist_and_read_back() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let mut state = SessionState::fresh(&SessionSettings::default());
        state.attempts_remaining = 2;
        state.best_offset_ms = Some(12);
        state.best_reward = 10;
        state.last_attempt_at = Some(now);
        state.revision = 1;

        let mut txn = db.begin(&player()).unwrap();
        let attempt = txn.persist_accepted_attempt(12, now, &state).unwrap();
        txn.commit().unwrap();

        assert_eq!(db.get_session_state(&player()).unwrap(), Some(state));
        let recent = db.list_recent_attempts(&player(), 10).unwrap();
        assert_eq!(recent, vec![attempt]);
        assert_eq!(db.count_attempts(&player()).unwrap(), 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let db = Database::open_memory().unwrap();
        let state = SessionState::fresh(&SessionSettings::default());
        {
            let mut txn = db.begin(&player()).unwrap();
            txn.persist_accepted_attempt(3, Utc::now(), &state).unwrap();
        }
        assert!(db.get_session_state(&player()).unwrap().is_none());
        assert_eq!(db.count_attempts(&player()).unwrap(), 0);

        // The connection is usable again after rollback.
        let mut txn = db.begin(&player()).unwrap();
        txn.write_state(&state).unwrap();
        txn.commit().unwrap();
        assert!(db.get_session_state(&player()).unwrap().is_some());
    }

    #[test]
    fn recent_attempts_respect_limit_and_order() {
        let db = Database::open_memory().unwrap();
        let state = SessionState::fresh(&SessionSettings::default());
        for offset in [9, 8, 7] {
            let mut txn = db.begin(&player()).unwrap();
            txn.persist_accepted_attempt(offset, Utc::now(), &state).unwrap();
            txn.commit().unwrap();
        }
        let recent = db.list_recent_attempts(&player(), 2).unwrap();
        assert_eq!(recent.iter().map(|a| a.offset_ms).collect::<Vec<_>>(), vec![7, 8]);
    }
}
