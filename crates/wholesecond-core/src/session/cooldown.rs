use chrono::{DateTime, Duration, Utc};

use super::state::{SessionPhase, SessionState};
use crate::settings::SessionSettings;

/// Time left before the next session opens, or `None` if the player can
/// submit right now.
pub fn remaining_cooldown(
    state: &SessionState,
    settings: &SessionSettings,
    now: DateTime<Utc>,
) -> Option<Duration> {
    match state.phase(settings, now) {
        SessionPhase::ExhaustedCooling { ready_at } => Some(ready_at - now),
        SessionPhase::Active | SessionPhase::ExhaustedReady => None,
    }
}

/// Human-readable retry estimate: sub-minute remainders read "less than a
/// minute", everything else rounds up to whole minutes.
pub fn format_retry_after(remaining: Duration) -> String {
    let ms = remaining.num_milliseconds();
    if ms < 60_000 {
        return "less than a minute".to_string();
    }
    let minutes = (ms + 59_999) / 60_000;
    if minutes == 1 {
        "in 1 minute".to_string()
    } else {
        format!("in {minutes} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sub_minute() {
        assert_eq!(format_retry_after(Duration::seconds(59)), "less than a minute");
        assert_eq!(format_retry_after(Duration::zero()), "less than a minute");
    }

    #[test]
    fn rounds_up_to_whole_minutes() {
        assert_eq!(format_retry_after(Duration::seconds(60)), "in 1 minute");
        assert_eq!(format_retry_after(Duration::seconds(61)), "in 2 minutes");
        assert_eq!(format_retry_after(Duration::seconds(120)), "in 2 minutes");
        assert_eq!(format_retry_after(Duration::minutes(59) + Duration::seconds(1)), "in 60 minutes");
    }

    #[test]
    fn remaining_only_while_cooling() {
        let settings = SessionSettings::new(3, 60, &[]);
        let now = Utc::now();
        let mut state = SessionState::fresh(&settings);
        assert_eq!(remaining_cooldown(&state, &settings, now), None);

        state.attempts_remaining = 0;
        state.last_attempt_at = Some(now - Duration::minutes(45));
        assert_eq!(
            remaining_cooldown(&state, &settings, now),
            Some(Duration::minutes(15))
        );

        state.last_attempt_at = Some(now - Duration::minutes(60));
        assert_eq!(remaining_cooldown(&state, &settings, now), None);
    }
}
