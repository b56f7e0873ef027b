//! Per-player session state.
//!
//! ## Phases
//!
//! ```text
//! Active --(last attempt)--> ExhaustedCooling --(cooldown elapsed)--> ExhaustedReady
//!    ^                                                                      |
//!    +-------------------(reset, consumed by the next attempt)--------------+
//! ```
//!
//! `ExhaustedReady` is transient: the next submission resets the session and
//! is accepted against the fresh session in the same commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::SessionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    /// At least one attempt left.
    Active,
    /// No attempts left; a new session opens at `ready_at`.
    ExhaustedCooling { ready_at: DateTime<Utc> },
    /// No attempts left and the cooldown has elapsed.
    ExhaustedReady,
}

/// One logical row per player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub attempts_remaining: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Smallest offset accepted since the last reset.
    pub best_offset_ms: Option<u32>,
    /// Reward locked in for `best_offset_ms` when it was set; `0` when unset.
    pub best_reward: u32,
    /// Write counter; bumped on every persisted change.
    #[serde(default)]
    pub revision: u64,
}

impl SessionState {
    /// A brand new session with every attempt available.
    pub fn fresh(settings: &SessionSettings) -> Self {
        Self {
            attempts_remaining: settings.attempts_per_session(),
            last_attempt_at: None,
            best_offset_ms: None,
            best_reward: 0,
            revision: 0,
        }
    }

    pub fn phase(&self, settings: &SessionSettings, now: DateTime<Utc>) -> SessionPhase {
        if self.attempts_remaining > 0 {
            return SessionPhase::Active;
        }
        match self.last_attempt_at {
            Some(last) => {
                let ready_at = last + settings.cooldown();
                if now >= ready_at {
                    SessionPhase::ExhaustedReady
                } else {
                    SessionPhase::ExhaustedCooling { ready_at }
                }
            }
            // Exhausted without a timestamp cannot be waited out.
            None => SessionPhase::ExhaustedReady,
        }
    }

    /// Attempts made in the current session, as seen by the ledger view.
    ///
    /// While attempts remain this is `per_session - remaining`; once
    /// exhausted it is the full session size (the just-completed session).
    pub fn attempts_made(&self, settings: &SessionSettings) -> u32 {
        let per_session = settings.attempts_per_session();
        if self.attempts_remaining > 0 {
            per_session.saturating_sub(self.attempts_remaining)
        } else {
            per_session
        }
    }

    /// Reopen the session in place. Keeps the revision counter.
    pub(crate) fn reopen(&mut self, settings: &SessionSettings) {
        self.attempts_remaining = settings.attempts_per_session();
        self.last_attempt_at = None;
        self.best_offset_ms = None;
        self.best_reward = 0;
    }

    /// Account for one accepted attempt. Returns `true` if it became the best.
    ///
    /// Ties keep the earlier best.
    pub(crate) fn record_attempt(&mut self, offset_ms: u32, reward: u32, now: DateTime<Utc>) -> bool {
        let improved = self.best_offset_ms.map_or(true, |best| offset_ms < best);
        if improved {
            self.best_offset_ms = Some(offset_ms);
            self.best_reward = reward;
        }
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.last_attempt_at = Some(now);
        improved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn settings() -> SessionSettings {
        SessionSettings::new(3, 60, &[])
    }

    #[test]
    fn fresh_state_is_active() {
        let s = SessionState::fresh(&settings());
        assert_eq!(s.attempts_remaining, 3);
        assert_eq!(s.phase(&settings(), Utc::now()), SessionPhase::Active);
        assert_eq!(s.attempts_made(&settings()), 0);
    }

    #[test]
    fn exhausted_phase_depends_on_cooldown() {
        let now = Utc::now();
        let mut s = SessionState::fresh(&settings());
        s.attempts_remaining = 0;
        s.last_attempt_at = Some(now - Duration::minutes(59));
        assert_eq!(
            s.phase(&settings(), now),
            SessionPhase::ExhaustedCooling {
                ready_at: now + Duration::minutes(1)
            }
        );
        s.last_attempt_at = Some(now - Duration::minutes(60));
        assert_eq!(s.phase(&settings(), now), SessionPhase::ExhaustedReady);
        assert_eq!(s.attempts_made(&settings()), 3);
    }

    #[test]
    fn exhausted_without_timestamp_is_ready() {
        let mut s = SessionState::fresh(&settings());
        s.attempts_remaining = 0;
        assert_eq!(s.phase(&settings(), Utc::now()), SessionPhase::ExhaustedReady);
    }

    #[test]
    fn record_attempt_keeps_first_of_equal_offsets() {
        let now = Utc::now();
        let mut s = SessionState::fresh(&settings());
        assert!(s.record_attempt(5, 15, now));
        assert!(!s.record_attempt(5, 99, now));
        assert_eq!(s.best_reward, 15);
        assert_eq!(s.attempts_remaining, 1);
    }

    #[test]
    fn attempts_made_saturates_when_settings_shrink() {
        let mut s = SessionState::fresh(&SessionSettings::new(5, 60, &[]));
        s.attempts_remaining = 4;
        assert_eq!(s.attempts_made(&settings()), 0);
    }
}
