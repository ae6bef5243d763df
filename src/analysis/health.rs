/// Freshness-based fleet health.
///
/// Built on the same snapshot primitives as the summary counters, but
/// judged against the clock: a station is "online" only while its latest
/// reading sits inside the online window.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::analysis::latest::latest_per_station;
use crate::freshness::{FreshnessPolicy, is_fresh_at};
use crate::model::{HealthMetrics, LiveReading, PARAM_POWER_FEED_A, PARAM_POWER_FEED_B};

/// Computes `HealthMetrics` for the snapshot at instant `now`.
pub fn fleet_health<S: AsRef<str>>(
    readings: &[LiveReading],
    known_station_ids: &[S],
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> HealthMetrics {
    let latest = latest_per_station(readings);

    let mut universe: BTreeSet<&str> = known_station_ids.iter().map(AsRef::as_ref).collect();
    universe.extend(latest.iter().map(|r| r.station_id.as_str()));
    let total_stations = universe.len();

    let online_stations = latest
        .iter()
        .filter(|r| is_fresh_at(r, policy.online_window(), now))
        .count();
    let network_online = latest
        .iter()
        .filter(|r| is_fresh_at(r, policy.network_window(), now))
        .count();
    let dual_feed_power = latest
        .iter()
        .filter(|r| feed_live(r, PARAM_POWER_FEED_A) && feed_live(r, PARAM_POWER_FEED_B))
        .count();

    HealthMetrics {
        total_stations,
        online_stations,
        network_online,
        system_health: system_health(online_stations, total_stations),
        dual_feed_power,
        evaluated_at: now,
    }
}

/// Percentage of fresh stations, rounded to the nearest integer.
/// Returns 0 for an empty fleet instead of dividing by zero.
pub fn system_health(fresh: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (fresh as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn feed_live(reading: &LiveReading, code: &str) -> bool {
    reading.parameter(code).is_some_and(|v| v > 0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
