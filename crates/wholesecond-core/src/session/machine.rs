//! Session state machine.
//!
//! Submission is decided in two steps:
//!
//! 1. [`check_eligibility`] runs on an unlocked snapshot and decides whether
//!    the attempt may proceed, and whether it opens a new session.
//! 2. [`plan_commit`] runs on the fresh state read inside the player's
//!    exclusive transaction and re-applies that decision. A racing request
//!    that consumed the last slot in between is caught here.
//!
//! Both steps are pure; the service owns the I/O.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::state::{SessionPhase, SessionState};
use crate::settings::SessionSettings;

/// Expected, non-fatal refusals. Callers retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Session exhausted and the cooldown is still running.
    CooldownActive {
        #[serde(rename = "retry_after_ms", with = "duration_ms")]
        retry_after: Duration,
        ready_at: DateTime<Utc>,
    },
    /// No attempt slot was left when the write was attempted.
    NoAttemptsLeft,
}

/// Outcome of the snapshot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Proceed; `renew_session` means the cooldown has elapsed and the
    /// commit must reset the session before accepting.
    Eligible { renew_session: bool },
    Rejected(Rejection),
}

/// What the commit should write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitPlan {
    Accept {
        /// State after the attempt, revision already bumped.
        updated: SessionState,
        reward: u32,
        renewed: bool,
        new_best: bool,
    },
    Rejected(Rejection),
}

/// Decide eligibility from a snapshot.
pub fn check_eligibility(
    state: &SessionState,
    settings: &SessionSettings,
    now: DateTime<Utc>,
) -> Eligibility {
    match state.phase(settings, now) {
        SessionPhase::Active => Eligibility::Eligible {
            renew_session: false,
        },
        SessionPhase::ExhaustedCooling { ready_at } => {
            Eligibility::Rejected(Rejection::CooldownActive {
                retry_after: ready_at - now,
                ready_at,
            })
        }
        SessionPhase::ExhaustedReady => Eligibility::Eligible {
            renew_session: true,
        },
    }
}

/// Apply an eligible attempt to the fresh state.
///
/// A renewal decided on a stale snapshot is skipped if another request has
/// already reopened the session; a session found exhausted without a planned
/// renewal is refused with [`Rejection::NoAttemptsLeft`].
pub fn plan_commit(
    fresh: &SessionState,
    renew_session: bool,
    offset_ms: u32,
    settings: &SessionSettings,
    now: DateTime<Utc>,
) -> CommitPlan {
    let mut updated = fresh.clone();
    let mut renewed = false;

    if updated.attempts_remaining == 0 {
        let ready = updated.phase(settings, now) == SessionPhase::ExhaustedReady;
        if !(renew_session && ready) {
            return CommitPlan::Rejected(Rejection::NoAttemptsLeft);
        }
        updated.reopen(settings);
        renewed = true;
    }

    let reward = settings.resolve_reward(offset_ms);
    let new_best = updated.record_attempt(offset_ms, reward, now);
    updated.revision = fresh.revision + 1;

    CommitPlan::Accept {
        updated,
        reward,
        renewed,
        new_best,
    }
}

mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::milliseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings::new(3, 60, &[])
    }

    fn exhausted(last: DateTime<Utc>) -> SessionState {
        SessionState {
            attempts_remaining: 0,
            last_attempt_at: Some(last),
            best_offset_ms: Some(4),
            best_reward: 15,
            revision: 3,
        }
    }

    #[test]
    fn active_state_is_eligible_without_renewal() {
        let s = SessionState::fresh(&settings());
        assert_eq!(
            check_eligibility(&s, &settings(), Utc::now()),
            Eligibility::Eligible {
                renew_session: false
            }
        );
    }

    #[test]
    fn cooling_state_reports_retry_after() {
        let now = Utc::now();
        let s = exhausted(now - Duration::minutes(59));
        match check_eligibility(&s, &settings(), now) {
            Eligibility::Rejected(Rejection::CooldownActive { retry_after, .. }) => {
                assert_eq!(retry_after, Duration::minutes(1));
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn renewal_resets_then_accepts() {
        let now = Utc::now();
        let s = exhausted(now - Duration::minutes(60));
        let plan = plan_commit(&s, true, 40, &settings(), now);
        match plan {
            CommitPlan::Accept {
                updated,
                reward,
                renewed,
                new_best,
            } => {
                assert!(renewed);
                assert!(new_best);
                assert_eq!(reward, 10);
                assert_eq!(updated.attempts_remaining, 2);
                assert_eq!(updated.best_offset_ms, Some(40));
                assert_eq!(updated.best_reward, 10);
                assert_eq!(updated.last_attempt_at, Some(now));
                assert_eq!(updated.revision, 4);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn stale_renewal_is_not_repeated() {
        let now = Utc::now();
        let mut fresh = SessionState::fresh(&settings());
        fresh.attempts_remaining = 2;
        fresh.best_offset_ms = Some(1);
        fresh.best_reward = 15;
        match plan_commit(&fresh, true, 9, &settings(), now) {
            CommitPlan::Accept {
                updated, renewed, ..
            } => {
                assert!(!renewed);
                assert_eq!(updated.attempts_remaining, 1);
                assert_eq!(updated.best_offset_ms, Some(1));
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_without_planned_renewal_is_refused() {
        let now = Utc::now();
        let s = exhausted(now);
        assert_eq!(
            plan_commit(&s, false, 0, &settings(), now),
            CommitPlan::Rejected(Rejection::NoAttemptsLeft)
        );
        // Renewal planned on a stale snapshot, but the fresh row is cooling.
        assert_eq!(
            plan_commit(&s, true, 0, &settings(), now),
            CommitPlan::Rejected(Rejection::NoAttemptsLeft)
        );
    }

    #[test]
    fn rejection_serializes_with_reason_tag() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(Rejection::CooldownActive {
            retry_after: Duration::seconds(90),
            ready_at: now,
        })
        .unwrap();
        assert_eq!(json["reason"], "cooldown_active");
        assert_eq!(json["retry_after_ms"], 90_000);
        let back: Rejection = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Rejection::CooldownActive { .. }));
    }
}
