/// Fleet status aggregation.
///
/// Folds one snapshot of live readings plus the station roster into a
/// `StatusSummary`. Counters keyed off a parameter are presence-gated: a
/// station missing that parameter contributes to neither side of the pair.
///
/// Station universe: `total = |roster ∪ reporting stations|`, so
/// `active + inactive == total` holds for every input. A reading from a
/// station the roster does not know is still counted as active.

use std::collections::BTreeSet;

use crate::analysis::latest::latest_per_station;
use crate::model::{LiveReading, ParameterKeys, StatusSummary};

/// Aggregates with the default parameter codes (no trip flag).
pub fn aggregate<S: AsRef<str>>(readings: &[LiveReading], known_station_ids: &[S]) -> StatusSummary {
    aggregate_with(readings, known_station_ids, &ParameterKeys::default())
}

/// Aggregates using the given parameter codes.
///
/// Values are compared against exact zero with no scaling or rounding:
/// - pump: `> 0` on, `== 0` off
/// - mode: `!= 0` auto, `== 0` manual
/// - power: `!= 0` available, `== 0` failed
/// - trip: `!= 0` tripped
pub fn aggregate_with<S: AsRef<str>>(
    readings: &[LiveReading],
    known_station_ids: &[S],
    keys: &ParameterKeys,
) -> StatusSummary {
    let latest = latest_per_station(readings);

    let reporting: BTreeSet<&str> = latest.iter().map(|r| r.station_id.as_str()).collect();
    let roster: BTreeSet<&str> = known_station_ids.iter().map(AsRef::as_ref).collect();

    let mut summary = StatusSummary {
        total_stations: roster.union(&reporting).count(),
        active_stations: reporting.len(),
        inactive_stations: roster.difference(&reporting).count(),
        ..StatusSummary::default()
    };

    for reading in &latest {
        match value(reading, &keys.pump_running) {
            Some(v) if v > 0.0 => summary.pumps_on += 1,
            Some(v) if v == 0.0 => summary.pumps_off += 1,
            _ => {}
        }

        match value(reading, &keys.pump_mode) {
            Some(v) if v != 0.0 => summary.auto_mode += 1,
            Some(_) => summary.manual_mode += 1,
            None => {}
        }

        match value(reading, &keys.power) {
            Some(v) if v != 0.0 => summary.power_available += 1,
            Some(_) => summary.power_failed += 1,
            None => {}
        }

        if let Some(trip_code) = &keys.trip {
            if value(reading, trip_code).is_some_and(|v| v != 0.0) {
                summary.trip_sites += 1;
            }
        }
    }

    summary
}

/// A parameter counts as present only if it carries a real number.
fn value(reading: &LiveReading, code: &str) -> Option<f64> {
    reading.parameter(code).filter(|v| !v.is_nan())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PARAM_PUMP_MODE, PARAM_PUMP_RUNNING, PARAM_VOLTAGE};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const NO_ROSTER: &[&str] = &[];

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn reading(station: &str) -> LiveReading {
        LiveReading::new(station, t0())
    }

    // --- Station universe ---------------------------------------------------

    #[test]
    fn test_empty_input_yields_all_zero_summary() {
        assert_eq!(aggregate(&[], NO_ROSTER), StatusSummary::default());
    }

    #[test]
    fn test_roster_only_stations_are_inactive() {
        let summary = aggregate(&[], &["TW-01", "TW-02"]);
        assert_eq!(summary.total_stations, 2);
        assert_eq!(summary.active_stations, 0);
        assert_eq!(summary.inactive_stations, 2);
    }

    #[test]
    fn test_reading_without_parameters_counts_only_as_active() {
        let summary = aggregate(&[reading("TW-01")], &["TW-01"]);
        assert_eq!(
            summary,
            StatusSummary {
                total_stations: 1,
                active_stations: 1,
                ..StatusSummary::default()
            }
        );
    }

    #[test]
    fn test_unknown_station_reading_extends_the_universe() {
        let summary = aggregate(&[reading("TW-99")], &["TW-01"]);
        assert_eq!(summary.total_stations, 2);
        assert_eq!(summary.active_stations, 1);
        assert_eq!(summary.inactive_stations, 1);
    }

    #[test]
    fn test_duplicate_roster_ids_count_once() {
        let summary = aggregate(&[], &["TW-01", "TW-01"]);
        assert_eq!(summary.total_stations, 1);
    }

    // --- Presence-gated counters -------------------------------------------

    #[test]
    fn test_pump_running_thresholds() {
        let readings = vec![
            reading("A").with_parameter(PARAM_PUMP_RUNNING, 1.0),
            reading("B").with_parameter(PARAM_PUMP_RUNNING, 0.0),
            reading("C").with_parameter(PARAM_PUMP_RUNNING, 0.5),
            reading("D").with_parameter(PARAM_PUMP_RUNNING, -1.0),
            reading("E"),
        ];
        let summary = aggregate(&readings, NO_ROSTER);
        assert_eq!(summary.pumps_on, 2, "strictly positive values are on");
        assert_eq!(summary.pumps_off, 1, "only exact zero is off");
    }

    #[test]
    fn test_mode_and_power_use_nonzero_rule() {
        let readings = vec![
            reading("A")
                .with_parameter(PARAM_PUMP_MODE, 1.0)
                .with_parameter(PARAM_VOLTAGE, 228.0),
            reading("B")
                .with_parameter(PARAM_PUMP_MODE, 0.0)
                .with_parameter(PARAM_VOLTAGE, 0.0),
            reading("C")
                .with_parameter(PARAM_PUMP_MODE, 2.0)
                .with_parameter(PARAM_VOLTAGE, -3.0),
        ];
        let summary = aggregate(&readings, NO_ROSTER);
        assert_eq!(summary.auto_mode, 2);
        assert_eq!(summary.manual_mode, 1);
        assert_eq!(summary.power_available, 2);
        assert_eq!(summary.power_failed, 1);
    }

    #[test]
    fn test_nan_parameter_is_treated_as_missing() {
        let readings = vec![reading("A").with_parameter(PARAM_VOLTAGE, f64::NAN)];
        let summary = aggregate(&readings, NO_ROSTER);
        assert_eq!(summary.power_available, 0);
        assert_eq!(summary.power_failed, 0);
    }

    #[test]
    fn test_trip_counter_disabled_by_default() {
        let readings = vec![reading("A").with_parameter("P48", 1.0)];
        assert_eq!(aggregate(&readings, NO_ROSTER).trip_sites, 0);
    }

    #[test]
    fn test_trip_counter_with_configured_code() {
        let keys = ParameterKeys {
            trip: Some("P48".to_string()),
            ..ParameterKeys::default()
        };
        let readings = vec![
            reading("A").with_parameter("P48", 1.0),
            reading("B").with_parameter("P48", 0.0),
            reading("C"),
        ];
        assert_eq!(aggregate_with(&readings, NO_ROSTER, &keys).trip_sites, 1);
    }

    #[test]
    fn test_custom_codes_are_honoured() {
        let keys = ParameterKeys {
            pump_running: "P10".to_string(),
            ..ParameterKeys::default()
        };
        let readings = vec![reading("A")
            .with_parameter("P10", 1.0)
            .with_parameter(PARAM_PUMP_RUNNING, 0.0)];
        let summary = aggregate_with(&readings, NO_ROSTER, &keys);
        assert_eq!(summary.pumps_on, 1);
        assert_eq!(summary.pumps_off, 0);
    }

    // --- Dedup --------------------------------------------------------------

    #[test]
    fn test_stale_duplicate_does_not_affect_counts() {
        let readings = vec![
            reading("TW-01").with_parameter(PARAM_PUMP_RUNNING, 0.0),
            LiveReading::new("TW-01", t0() + Duration::minutes(1))
                .with_parameter(PARAM_PUMP_RUNNING, 1.0),
        ];
        let summary = aggregate(&readings, NO_ROSTER);
        assert_eq!(summary.total_stations, 1);
        assert_eq!(summary.pumps_on, 1);
        assert_eq!(summary.pumps_off, 0);
    }
}
