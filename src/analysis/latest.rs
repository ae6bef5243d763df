/// Reduces a raw live snapshot to at most one reading per station.
///
/// The live table is expected to hold a single row per station, but the
/// source does not enforce it. When duplicates show up, only the reading
/// with the latest timestamp takes part in any count.
///
/// # Tie-break
/// Two readings for one station with the same timestamp are ordered by
/// content so the outcome never depends on input order:
///   1. the reading carrying more parameters wins;
///   2. otherwise the parameter lists are compared code by code, then value
///      by value (`f64::total_cmp`), and the greater list wins.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::LiveReading;

/// Returns the current reading of every station present in `readings`,
/// sorted by station id.
pub fn latest_per_station(readings: &[LiveReading]) -> Vec<&LiveReading> {
    let mut latest: BTreeMap<&str, &LiveReading> = BTreeMap::new();

    for reading in readings {
        latest
            .entry(reading.station_id.as_str())
            .and_modify(|current| {
                if supersedes(reading, current) {
                    *current = reading;
                }
            })
            .or_insert(reading);
    }

    latest.into_values().collect()
}

/// `true` if `candidate` should replace `current` for the same station.
fn supersedes(candidate: &LiveReading, current: &LiveReading) -> bool {
    match candidate.timestamp.cmp(&current.timestamp) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => content_order(candidate, current) == Ordering::Greater,
    }
}

fn content_order(a: &LiveReading, b: &LiveReading) -> Ordering {
    a.parameters
        .len()
        .cmp(&b.parameters.len())
        .then_with(|| {
            a.parameters
                .iter()
                .zip(b.parameters.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
