/// Station roster helpers.
///
/// The roster (the list of known stations with their zone and location) is
/// owned by the telemetry database; this module only works on a fetched copy.
/// It is the single place that decides what "known station" means: other
/// modules go through `known_ids` rather than reading `StationRecord`s.

use std::collections::{BTreeSet, HashSet};

use crate::model::{LiveReading, StationRecord};

/// Zone filter value meaning "every zone".
pub const ALL_ZONES: &str = "ALL";

/// Normalizes a zone query parameter: absent, empty or `ALL` means no filter.
pub fn zone_filter(zone: Option<&str>) -> Option<&str> {
    zone.map(str::trim)
        .filter(|z| !z.is_empty() && !z.eq_ignore_ascii_case(ALL_ZONES))
}

/// Returns the stations belonging to `zone`, or all of them when `zone` is `None`.
pub fn in_zone<'a>(roster: &'a [StationRecord], zone: Option<&str>) -> Vec<&'a StationRecord> {
    roster
        .iter()
        .filter(|s| zone.is_none_or(|z| s.zone.eq_ignore_ascii_case(z)))
        .collect()
}

/// Station ids of the roster, in roster order.
pub fn known_ids(roster: &[StationRecord]) -> Vec<&str> {
    roster.iter().map(|s| s.station_id.as_str()).collect()
}

/// The roster with repeated station ids removed; the first entry wins.
pub fn unique_stations(roster: &[StationRecord]) -> Vec<&StationRecord> {
    let mut seen = HashSet::new();
    roster
        .iter()
        .filter(|s| seen.insert(s.station_id.as_str()))
        .collect()
}

/// Station ids that appear more than once in the roster.
pub fn duplicate_ids(roster: &[StationRecord]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut dupes = BTreeSet::new();
    for station in roster {
        if !seen.insert(station.station_id.as_str()) {
            dupes.insert(station.station_id.as_str());
        }
    }
    dupes.into_iter().collect()
}

/// Ids of stations that report live readings but are missing from the roster.
pub fn unknown_stations<'a>(roster: &[StationRecord], readings: &'a [LiveReading]) -> Vec<&'a str> {
    let known: HashSet<&str> = roster.iter().map(|s| s.station_id.as_str()).collect();
    readings
        .iter()
        .map(|r| r.station_id.as_str())
        .filter(|id| !known.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn station(id: &str, zone: &str) -> StationRecord {
        StationRecord {
            station_id: id.to_string(),
            name: format!("Tube well {}", id),
            zone: zone.to_string(),
            station_type: Some("TW".to_string()),
            latitude: None,
            longitude: None,
        }
    }

    fn roster() -> Vec<StationRecord> {
        vec![
            station("TW-01", "North"),
            station("TW-02", "North"),
            station("TW-03", "South"),
        ]
    }

    #[test]
    fn test_zone_filter_treats_all_and_blank_as_no_filter() {
        assert_eq!(zone_filter(None), None);
        assert_eq!(zone_filter(Some("ALL")), None);
        assert_eq!(zone_filter(Some("all")), None);
        assert_eq!(zone_filter(Some("  ")), None);
        assert_eq!(zone_filter(Some("North")), Some("North"));
    }

    #[test]
    fn test_in_zone_filters_case_insensitively() {
        let roster = roster();
        assert_eq!(in_zone(&roster, Some("north")).len(), 2);
        assert_eq!(in_zone(&roster, Some("South")).len(), 1);
        assert_eq!(in_zone(&roster, None).len(), 3);
        assert!(in_zone(&roster, Some("East")).is_empty());
    }

    #[test]
    fn test_known_ids_matches_roster_length() {
        assert_eq!(known_ids(&roster()), vec!["TW-01", "TW-02", "TW-03"]);
    }

    #[test]
    fn test_unique_stations_keeps_first_entry() {
        let mut roster = roster();
        roster.push(station("TW-01", "East"));
        let unique = unique_stations(&roster);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].zone, "North");
    }

    #[test]
    fn test_duplicate_ids_are_reported_once() {
        let mut roster = roster();
        roster.push(station("TW-01", "North"));
        roster.push(station("TW-01", "North"));
        assert_eq!(duplicate_ids(&roster), vec!["TW-01"]);
        assert!(duplicate_ids(&self::roster()).is_empty());
    }

    #[test]
    fn test_unknown_stations_lists_readings_outside_roster() {
        let now = Utc::now();
        let readings = vec![
            LiveReading::new("TW-01", now),
            LiveReading::new("TW-77", now),
            LiveReading::new("TW-77", now),
        ];
        assert_eq!(unknown_stations(&roster(), &readings), vec!["TW-77"]);
    }
}
