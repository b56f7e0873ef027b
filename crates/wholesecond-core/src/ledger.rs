//! Attempt ledger.
//!
//! Attempts are append-only and kept forever. There is no session id on an
//! attempt: the current session is derived from the session state as "the
//! most recent N attempts", N being [`SessionState::attempts_made`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::session::SessionState;
use crate::settings::SessionSettings;

/// One accepted attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub player_id: PlayerId,
    pub offset_ms: u32,
    pub created_at: DateTime<Utc>,
}

/// An attempt as shown in a history list.
///
/// `display_reward` uses the reward table in force when the list is built,
/// which may differ from what was locked into the session's best reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptView {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub display_reward: u32,
}

/// Number of ledger rows that belong to the current session.
pub fn current_session_len(state: &SessionState, settings: &SessionSettings) -> usize {
    state.attempts_made(settings) as usize
}

/// Trim `recent` (newest first) to the current session and attach display
/// rewards.
pub fn current_session_view(
    recent: Vec<Attempt>,
    state: &SessionState,
    settings: &SessionSettings,
    limit: usize,
) -> Vec<AttemptView> {
    let take = current_session_len(state, settings).min(limit);
    recent
        .into_iter()
        .take(take)
        .map(|attempt| AttemptView {
            display_reward: settings.resolve_reward(attempt.offset_ms),
            attempt,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempts(offsets: &[u32]) -> Vec<Attempt> {
        let player = PlayerId::new("p").unwrap();
        offsets
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &offset_ms)| Attempt {
                id: i as i64 + 1,
                player_id: player.clone(),
                offset_ms,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn view_follows_attempts_made() {
        let settings = SessionSettings::new(3, 60, &[]);
        let mut state = SessionState::fresh(&settings);
        state.attempts_remaining = 1;
        let view = current_session_view(attempts(&[7, 8, 9, 10]), &state, &settings, 50);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].attempt.offset_ms, 10);
        assert_eq!(view[0].display_reward, 15);
    }

    #[test]
    fn exhausted_session_shows_full_session() {
        let settings = SessionSettings::new(3, 60, &[]);
        let mut state = SessionState::fresh(&settings);
        state.attempts_remaining = 0;
        let view = current_session_view(attempts(&[1, 2, 3, 4]), &state, &settings, 50);
        assert_eq!(view.len(), 3);
        let view = current_session_view(attempts(&[1, 2, 3, 4]), &state, &settings, 2);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn fresh_session_view_is_empty() {
        let settings = SessionSettings::new(3, 60, &[]);
        let state = SessionState::fresh(&settings);
        assert!(current_session_view(attempts(&[1, 2]), &state, &settings, 50).is_empty());
    }
}
