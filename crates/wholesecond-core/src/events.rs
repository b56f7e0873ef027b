use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::session::{Rejection, SessionPhase};

/// Every state change in the system produces an Event.
/// Callers render them; the CLI prints them as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    AttemptAccepted {
        player_id: PlayerId,
        attempt_id: i64,
        offset_ms: u32,
        reward: u32,
        new_best: bool,
        attempts_remaining: u32,
        best_offset_ms: Option<u32>,
        best_reward: u32,
        at: DateTime<Utc>,
    },
    AttemptRejected {
        player_id: PlayerId,
        rejection: Rejection,
        /// Human-readable retry hint, e.g. "in 5 minutes".
        message: String,
        at: DateTime<Utc>,
    },
    /// Cooldown elapsed and the next attempt opened a new session.
    SessionRenewed {
        player_id: PlayerId,
        attempts_per_session: u32,
        at: DateTime<Utc>,
    },
    /// Session reset by an administrator.
    SessionReset {
        player_id: PlayerId,
        attempts_remaining: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        player_id: PlayerId,
        phase: SessionPhase,
        attempts_remaining: u32,
        attempts_per_session: u32,
        last_attempt_at: Option<DateTime<Utc>>,
        best_offset_ms: Option<u32>,
        best_reward: u32,
        /// Milliseconds until the next session opens, while cooling down.
        retry_after_ms: Option<i64>,
        at: DateTime<Utc>,
    },
}
