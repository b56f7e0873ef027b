//! In-memory session store.
//!
//! A single mutex guards every player's data. A transaction holds that
//! mutex for its whole life and stages writes until commit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{SessionStore, SessionTxn};
use crate::error::StoreError;
use crate::ledger::Attempt;
use crate::player::PlayerId;
use crate::session::SessionState;

#[derive(Debug, Default)]
struct MemoryInner {
    sessions: HashMap<PlayerId, SessionState>,
    attempts: Vec<Attempt>,
    next_attempt_id: i64,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Every attempt ever recorded for `player`, oldest first.
    pub fn all_attempts(&self, player: &PlayerId) -> Result<Vec<Attempt>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .attempts
            .iter()
            .filter(|a| &a.player_id == player)
            .cloned()
            .collect())
    }
}

impl SessionStore for MemoryStore {
    type Txn<'a> = MemoryTxn<'a>;

    fn get_session_state(&self, player: &PlayerId) -> Result<Option<SessionState>, StoreError> {
        Ok(self.lock()?.sessions.get(player).cloned())
    }

    fn list_recent_attempts(
        &self,
        player: &PlayerId,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .attempts
            .iter()
            .rev()
            .filter(|a| &a.player_id == player)
            .take(limit)
            .cloned()
            .collect())
    }

    fn begin(&self, player: &PlayerId) -> Result<MemoryTxn<'_>, StoreError> {
        Ok(MemoryTxn {
            guard: self.lock()?,
            player: player.clone(),
            staged_state: None,
            staged_attempts: Vec::new(),
        })
    }
}

/// Transaction over [`MemoryStore`]; holds the store lock until dropped.
pub struct MemoryTxn<'a> {
    guard: MutexGuard<'a, MemoryInner>,
    player: PlayerId,
    staged_state: Option<SessionState>,
    staged_attempts: Vec<Attempt>,
}

impl SessionTxn for MemoryTxn<'_> {
    fn session_state(&mut self) -> Result<Option<SessionState>, StoreError> {
        if let Some(staged) = &self.staged_state {
            return Ok(Some(staged.clone()));
        }
        Ok(self.guard.sessions.get(&self.player).cloned())
    }

    fn persist_accepted_attempt(
        &mut self,
        offset_ms: u32,
        created_at: DateTime<Utc>,
        updated: &SessionState,
    ) -> Result<Attempt, StoreError> {
        let attempt = Attempt {
            id: self.guard.next_attempt_id + 1 + self.staged_attempts.len() as i64,
            player_id: self.player.clone(),
            offset_ms,
            created_at,
        };
        self.staged_attempts.push(attempt.clone());
        self.staged_state = Some(updated.clone());
        Ok(attempt)
    }

    fn write_state(&mut self, state: &SessionState) -> Result<(), StoreError> {
        self.staged_state = Some(state.clone());
        Ok(())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let staged_attempts = std::mem::take(&mut self.staged_attempts);
        self.guard.next_attempt_id += staged_attempts.len() as i64;
        self.guard.attempts.extend(staged_attempts);
        if let Some(state) = self.staged_state.take() {
            self.guard.sessions.insert(self.player.clone(), state);
        }
        Ok(())
    }
}
