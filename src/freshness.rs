/// Live reading freshness.
///
/// Field devices push a new sample every few seconds while connected. A
/// reading that has not been refreshed for a few minutes means the station
/// dropped off the network, so health metrics only count fresh readings.
///
/// Two thresholds are kept independently: the online window (station
/// considered up) and the shorter network window (link considered healthy).
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, which keeps tests deterministic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::LiveReading;

/// Default online window, in minutes.
pub const DEFAULT_ONLINE_WINDOW_MINUTES: i64 = 5;

/// Default network window, in minutes.
pub const DEFAULT_NETWORK_WINDOW_MINUTES: i64 = 2;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    pub online_window_minutes: i64,
    pub network_window_minutes: i64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            online_window_minutes: DEFAULT_ONLINE_WINDOW_MINUTES,
            network_window_minutes: DEFAULT_NETWORK_WINDOW_MINUTES,
        }
    }
}

impl FreshnessPolicy {
    pub fn online_window(&self) -> Duration {
        Duration::minutes(self.online_window_minutes)
    }

    pub fn network_window(&self) -> Duration {
        Duration::minutes(self.network_window_minutes)
    }
}

// ---------------------------------------------------------------------------
// Freshness check
// ---------------------------------------------------------------------------

/// Returns `true` if the reading is no older than `window` relative to `now`.
///
/// Freshness is inclusive at the boundary:
///   age <= window  →  fresh
///   age >  window  →  not fresh
///
/// A timestamp ahead of `now` (device clock drift) has its age clamped to
/// zero and is therefore fresh.
pub fn is_fresh_at(reading: &LiveReading, window: Duration, now: DateTime<Utc>) -> bool {
    let age = (now - reading.timestamp).max(Duration::zero());
    age <= window
}

/// Convenience wrapper that uses the real current time.
/// Use `is_fresh_at` in tests to keep them deterministic.
pub fn is_fresh(reading: &LiveReading, window: Duration) -> bool {
    is_fresh_at(reading, window, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading_at(ts: DateTime<Utc>) -> LiveReading {
        LiveReading::new("TW-01", ts).with_parameter("P4", 230.0)
    }

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    // --- Fresh --------------------------------------------------------------

    #[test]
    fn test_reading_one_minute_old_is_fresh() {
        let reading = reading_at(fixed_now() - Duration::minutes(1));
        assert!(is_fresh_at(&reading, Duration::minutes(5), fixed_now()));
    }

    #[test]
    fn test_reading_exactly_at_window_is_fresh() {
        let reading = reading_at(fixed_now() - Duration::minutes(5));
        assert!(
            is_fresh_at(&reading, Duration::minutes(5), fixed_now()),
            "age == window must still count as fresh"
        );
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let reading = reading_at(fixed_now() + Duration::minutes(3));
        assert!(is_fresh_at(&reading, Duration::minutes(2), fixed_now()));
    }

    // --- Not fresh ----------------------------------------------------------

    #[test]
    fn test_reading_one_second_past_window_is_not_fresh() {
        let reading = reading_at(fixed_now() - Duration::minutes(5) - Duration::seconds(1));
        assert!(!is_fresh_at(&reading, Duration::minutes(5), fixed_now()));
    }

    #[test]
    fn test_same_reading_differs_between_network_and_online_window() {
        // Three minutes old: online, but outside the network window.
        let policy = FreshnessPolicy::default();
        let reading = reading_at(fixed_now() - Duration::minutes(3));
        assert!(is_fresh_at(&reading, policy.online_window(), fixed_now()));
        assert!(!is_fresh_at(&reading, policy.network_window(), fixed_now()));
    }

    #[test]
    fn test_default_policy_windows() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.online_window(), Duration::minutes(5));
        assert_eq!(policy.network_window(), Duration::minutes(2));
    }
}
