//! Session service: the single authority over a player's session.
//!
//! ## Submission protocol
//!
//! ```text
//! admit (snapshot read) --Rejected--> CooldownActive
//!        |
//!     Pending
//!        |
//! commit (exclusive txn: re-read, re-plan, append + update) --> Accepted | NoAttemptsLeft
//! ```
//!
//! [`SessionService::submit_attempt`] runs both phases back to back. They are
//! public separately so callers (and tests) can observe the window between
//! them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::Event;
use crate::ledger::{current_session_len, current_session_view, Attempt, AttemptView};
use crate::player::PlayerId;
use crate::session::{
    check_eligibility, format_retry_after, plan_commit, remaining_cooldown, CommitPlan,
    Eligibility, Rejection, SessionState,
};
use crate::settings::{SessionSettings, SettingsSource};
use crate::storage::{SessionStore, SessionTxn};

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedAttempt {
    pub attempt: Attempt,
    /// Reward for this attempt under the settings in force when it was accepted.
    pub reward: u32,
    pub session: SessionState,
    /// The cooldown had elapsed and this attempt opened a new session.
    pub session_renewed: bool,
    pub new_best: bool,
}

/// Result of [`SessionService::submit_attempt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted(AcceptedAttempt),
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            SubmitOutcome::Rejected(r) => Some(r),
            SubmitOutcome::Accepted(_) => None,
        }
    }

    /// Events describing this outcome, in the order they happened.
    pub fn events(&self, player: &PlayerId, settings: &SessionSettings, at: DateTime<Utc>) -> Vec<Event> {
        match self {
            SubmitOutcome::Accepted(accepted) => {
                let mut events = Vec::with_capacity(2);
                if accepted.session_renewed {
                    events.push(Event::SessionRenewed {
                        player_id: player.clone(),
                        attempts_per_session: settings.attempts_per_session(),
                        at,
                    });
                }
                events.push(Event::AttemptAccepted {
                    player_id: player.clone(),
                    attempt_id: accepted.attempt.id,
                    offset_ms: accepted.attempt.offset_ms,
                    reward: accepted.reward,
                    new_best: accepted.new_best,
                    attempts_remaining: accepted.session.attempts_remaining,
                    best_offset_ms: accepted.session.best_offset_ms,
                    best_reward: accepted.session.best_reward,
                    at,
                });
                events
            }
            SubmitOutcome::Rejected(rejection) => vec![Event::AttemptRejected {
                player_id: player.clone(),
                rejection: *rejection,
                message: rejection_message(rejection),
                at,
            }],
        }
    }
}

/// User-facing text for a rejection.
pub fn rejection_message(rejection: &Rejection) -> String {
    match rejection {
        Rejection::CooldownActive { retry_after, .. } => {
            format!("Session over. Next session {}", retry_after_phrase(*retry_after))
        }
        Rejection::NoAttemptsLeft => "No attempts left in this session".to_string(),
    }
}

fn retry_after_phrase(retry_after: Duration) -> String {
    let text = format_retry_after(retry_after);
    if text.starts_with("in ") {
        text
    } else {
        format!("in {text}")
    }
}

/// Admission granted by the snapshot check; consumed by [`SessionService::commit`].
#[derive(Debug, Clone)]
pub struct PendingAttempt {
    player: PlayerId,
    settings: SessionSettings,
    renew_session: bool,
}

impl PendingAttempt {
    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub fn renews_session(&self) -> bool {
        self.renew_session
    }
}

/// Outcome of [`SessionService::admit`].
#[derive(Debug, Clone)]
pub enum Admission {
    Pending(PendingAttempt),
    Rejected(Rejection),
}

/// Session service over a store, a settings source and a clock.
pub struct SessionService<S, C = SystemClock> {
    store: S,
    settings: Arc<dyn SettingsSource>,
    clock: C,
}

impl<S: SessionStore> SessionService<S, SystemClock> {
    pub fn new(store: S, settings: impl SettingsSource + 'static) -> Self {
        Self::with_clock(store, settings, SystemClock)
    }
}

impl<S: SessionStore, C: Clock> SessionService<S, C> {
    pub fn with_clock(store: S, settings: impl SettingsSource + 'static, clock: C) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings.session_settings()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current state; a never-seen player gets a fresh (unsaved) session.
    pub fn session_state(&self, player: &PlayerId) -> Result<SessionState> {
        let settings = self.settings();
        Ok(self
            .store
            .get_session_state(player)?
            .unwrap_or_else(|| SessionState::fresh(&settings)))
    }

    /// Submit an attempt scored at `offset_ms`, timestamped by the service clock.
    pub fn submit_attempt(&self, player: &PlayerId, offset_ms: u32) -> Result<SubmitOutcome> {
        self.submit_attempt_at(player, offset_ms, self.clock.now())
    }

    /// Submit an attempt at an explicit instant.
    pub fn submit_attempt_at(
        &self,
        player: &PlayerId,
        offset_ms: u32,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome> {
        match self.admit(player, now)? {
            Admission::Pending(pending) => self.commit(pending, offset_ms, now),
            Admission::Rejected(rejection) => Ok(SubmitOutcome::Rejected(rejection)),
        }
    }

    /// Snapshot eligibility check. Nothing is written.
    pub fn admit(&self, player: &PlayerId, now: DateTime<Utc>) -> Result<Admission> {
        let settings = self.settings();
        let snapshot = self
            .store
            .get_session_state(player)?
            .unwrap_or_else(|| SessionState::fresh(&settings));

        match check_eligibility(&snapshot, &settings, now) {
            Eligibility::Eligible { renew_session } => Ok(Admission::Pending(PendingAttempt {
                player: player.clone(),
                settings,
                renew_session,
            })),
            Eligibility::Rejected(rejection) => {
                tracing::debug!(player = %player, ?rejection, "attempt rejected at admission");
                Ok(Admission::Rejected(rejection))
            }
        }
    }

    /// Apply an admitted attempt inside the player's exclusive transaction.
    ///
    /// Either the attempt row and the updated session are both written, or
    /// neither is.
    pub fn commit(
        &self,
        pending: PendingAttempt,
        offset_ms: u32,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome> {
        let PendingAttempt {
            player,
            settings,
            renew_session,
        } = pending;

        let mut txn = self.store.begin(&player)?;
        let fresh = txn
            .session_state()?
            .unwrap_or_else(|| SessionState::fresh(&settings));

        match plan_commit(&fresh, renew_session, offset_ms, &settings, now) {
            CommitPlan::Rejected(rejection) => {
                drop(txn);
                tracing::debug!(player = %player, ?rejection, "attempt rejected at commit");
                Ok(SubmitOutcome::Rejected(rejection))
            }
            CommitPlan::Accept {
                updated,
                reward,
                renewed,
                new_best,
            } => {
                let attempt = txn.persist_accepted_attempt(offset_ms, now, &updated)?;
                txn.commit()?;

                if renewed {
                    tracing::info!(player = %player, "cooldown elapsed, new session opened");
                }
                tracing::info!(
                    player = %player,
                    attempt_id = attempt.id,
                    offset_ms,
                    reward,
                    attempts_remaining = updated.attempts_remaining,
                    "attempt accepted"
                );

                Ok(SubmitOutcome::Accepted(AcceptedAttempt {
                    attempt,
                    reward,
                    session: updated,
                    session_renewed: renewed,
                    new_best,
                }))
            }
        }
    }

    /// Administrative reset: full attempts, no best, empty current-session view.
    pub fn reset_session(&self, player: &PlayerId) -> Result<SessionState> {
        let settings = self.settings();
        let mut txn = self.store.begin(player)?;
        let revision = txn.session_state()?.map_or(0, |s| s.revision);

        let mut state = SessionState::fresh(&settings);
        state.revision = revision + 1;
        txn.write_state(&state)?;
        txn.commit()?;

        tracing::info!(player = %player, "session reset");
        Ok(state)
    }

    /// Time until `player` may submit again, if they are cooling down.
    pub fn remaining_cooldown(&self, player: &PlayerId, now: DateTime<Utc>) -> Result<Option<Duration>> {
        let state = self.session_state(player)?;
        Ok(remaining_cooldown(&state, &self.settings(), now))
    }

    /// Attempts of the current session, newest first, at most `limit`.
    pub fn current_session_attempts(&self, player: &PlayerId, limit: usize) -> Result<Vec<AttemptView>> {
        let settings = self.settings();
        let state = self.session_state(player)?;
        let wanted = current_session_len(&state, &settings).min(limit);
        if wanted == 0 {
            return Ok(Vec::new());
        }
        let recent = self.store.list_recent_attempts(player, wanted)?;
        Ok(current_session_view(recent, &state, &settings, limit))
    }

    /// Full state snapshot event for `player`.
    pub fn snapshot(&self, player: &PlayerId, now: DateTime<Utc>) -> Result<Event> {
        let settings = self.settings();
        let state = self.session_state(player)?;
        Ok(Event::StateSnapshot {
            player_id: player.clone(),
            phase: state.phase(&settings, now),
            attempts_remaining: state.attempts_remaining,
            attempts_per_session: settings.attempts_per_session(),
            last_attempt_at: state.last_attempt_at,
            best_offset_ms: state.best_offset_ms,
            best_reward: state.best_reward,
            retry_after_ms: remaining_cooldown(&state, &settings, now).map(|d| d.num_milliseconds()),
            at: now,
        })
    }
}
