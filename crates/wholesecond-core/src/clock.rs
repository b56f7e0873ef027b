//! Wall-clock sampling.
//!
//! The game clock is refreshed at a fixed interval for display, and sampled
//! once more at the instant the player clicks. The score of a click is its
//! distance from the nearest whole second, folded so that "just past :000"
//! and "just before the next :000" are measured the same way.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one second.
const MILLIS_PER_SECOND: u32 = 1000;

/// Default display refresh interval.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10;

/// Fold a millisecond-within-second into a distance from the whole second.
///
/// `m < 500` is late by `m`; `m >= 500` is early by `1000 - m`.
pub fn offset_from_millis(millis: u32) -> u32 {
    let m = millis % MILLIS_PER_SECOND;
    if m < MILLIS_PER_SECOND / 2 {
        m
    } else {
        MILLIS_PER_SECOND - m
    }
}

/// Offset of `now` from the nearest whole second.
pub fn sample_offset(now: DateTime<Utc>) -> u32 {
    offset_from_millis(millis_within_second(now))
}

fn millis_within_second(now: DateTime<Utc>) -> u32 {
    // Leap seconds report nanos >= 1e9; keep them inside 0..1000.
    (now.nanosecond() / 1_000_000) % MILLIS_PER_SECOND
}

/// Which side of the whole second a click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    Exact,
    Late,
    Early,
}

/// A single clock sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReading {
    pub at: DateTime<Utc>,
    /// Millisecond within the second (0-999).
    pub millis: u32,
    /// Folded distance from the whole second (0-500).
    pub offset_ms: u32,
    pub timing: Timing,
}

impl ClockReading {
    pub fn at(now: DateTime<Utc>) -> Self {
        let millis = millis_within_second(now);
        let timing = if millis == 0 {
            Timing::Exact
        } else if millis < MILLIS_PER_SECOND / 2 {
            Timing::Late
        } else {
            Timing::Early
        };
        Self {
            at: now,
            millis,
            offset_ms: offset_from_millis(millis),
            timing,
        }
    }

    /// `HH:MM:SS.mmm` rendering used by the clock display.
    pub fn display(&self) -> String {
        format!("{}.{:03}", self.at.format("%H:%M:%S"), self.millis)
    }
}

/// Fixed-interval clock sampler.
///
/// Owns no thread: the caller drives it by calling [`ClockSampler::tick`]
/// from its own loop.
#[derive(Debug, Clone)]
pub struct ClockSampler {
    interval: Duration,
    last: Option<ClockReading>,
}

impl ClockSampler {
    pub fn new(interval_ms: u64) -> Self {
        let interval_ms = interval_ms.max(1);
        Self {
            interval: Duration::milliseconds(i64::try_from(interval_ms).unwrap_or(i64::MAX)),
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_reading(&self) -> Option<&ClockReading> {
        self.last.as_ref()
    }

    /// Returns a new reading once at least one interval has passed since the
    /// previous one. A clock that went backwards also produces a reading.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<ClockReading> {
        let due = match self.last {
            None => true,
            Some(prev) => {
                let elapsed = now - prev.at;
                elapsed >= self.interval || elapsed < Duration::zero()
            }
        };
        if !due {
            return None;
        }
        let reading = ClockReading::at(now);
        self.last = Some(reading);
        Some(reading)
    }

    /// Sample for a user action; always produces a reading.
    pub fn capture(&mut self, now: DateTime<Utc>) -> ClockReading {
        let reading = ClockReading::at(now);
        self.last = Some(reading);
        reading
    }
}

impl Default for ClockSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL_MS)
    }
}

/// Source of "now" for the session service.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at_millis(ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::milliseconds(ms as i64)
    }

    #[test]
    fn boundary_values() {
        assert_eq!(offset_from_millis(0), 0);
        assert_eq!(offset_from_millis(499), 499);
        assert_eq!(offset_from_millis(500), 500);
        assert_eq!(offset_from_millis(501), 499);
        assert_eq!(offset_from_millis(999), 1);
    }

    #[test]
    fn sample_offset_reads_subsecond_millis() {
        assert_eq!(sample_offset(at_millis(7)), 7);
        assert_eq!(sample_offset(at_millis(993)), 7);
    }

    #[test]
    fn reading_reports_timing_side() {
        assert_eq!(ClockReading::at(at_millis(0)).timing, Timing::Exact);
        assert_eq!(ClockReading::at(at_millis(12)).timing, Timing::Late);
        assert_eq!(ClockReading::at(at_millis(988)).timing, Timing::Early);
        assert_eq!(ClockReading::at(at_millis(42)).display(), "12:00:00.042");
    }

    #[test]
    fn tick_respects_interval() {
        let mut sampler = ClockSampler::new(10);
        assert!(sampler.tick(at_millis(0)).is_some());
        assert!(sampler.tick(at_millis(5)).is_none());
        assert!(sampler.tick(at_millis(10)).is_some());
        assert!(sampler.tick(at_millis(19)).is_none());
    }

    #[test]
    fn capture_always_samples() {
        let mut sampler = ClockSampler::new(1000);
        sampler.tick(at_millis(0));
        let reading = sampler.capture(at_millis(3));
        assert_eq!(reading.offset_ms, 3);
        assert_eq!(sampler.last_reading(), Some(&reading));
    }

    proptest! {
        #[test]
        fn offset_is_symmetric(m in 0u32..1000) {
            let expected = if m < 500 { m } else { 1000 - m };
            prop_assert_eq!(offset_from_millis(m), expected);
            prop_assert!(offset_from_millis(m) <= 500);
        }
    }
}
