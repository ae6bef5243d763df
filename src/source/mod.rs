/// Telemetry source abstraction.
///
/// The roster and live tables are owned by an external database. This
/// module defines the read-only interface the rest of the service consumes,
/// plus the decoding rules that turn raw stored values into `LiveReading`s.
///
/// Implementations:
/// - `pg::PgTelemetrySource`: production, one session per call.
/// - `crate::dev_mode::FixtureSource`: JSON fixture for development.
/// - `MemorySource`: fixed snapshot, used by tests and examples.

pub mod pg;

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{LiveReading, StationRecord, StatusError};

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Read access to the station roster and the live table.
///
/// Calls are synchronous and may block on I/O; async callers must run them on
/// the blocking pool. Every call is an independent read: implementations
/// must not hand out references that outlive the call.
pub trait TelemetrySource: Send + Sync {
    /// Roster query. `zone` of `None` returns every station.
    fn list_known_stations(&self, zone: Option<&str>) -> Result<Vec<StationRecord>, StatusError>;

    /// Latest reading per station; with `station` set, at most that
    /// station's latest row.
    fn list_live_readings(&self, station: Option<&str>) -> Result<Vec<LiveReading>, StatusError>;
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// A source serving a fixed, replaceable snapshot.
///
/// `set_unavailable(true)` makes every call fail with `SourceUnavailable`,
/// which is how tests exercise the consumer error paths.
#[derive(Debug, Default)]
pub struct MemorySource {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    roster: Vec<StationRecord>,
    readings: Vec<LiveReading>,
    unavailable: bool,
}

impl MemorySource {
    pub fn new(roster: Vec<StationRecord>, readings: Vec<LiveReading>) -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                roster,
                readings,
                unavailable: false,
            }),
        }
    }

    pub fn replace_readings(&self, readings: Vec<LiveReading>) {
        self.lock().readings = readings;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-update; the data is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TelemetrySource for MemorySource {
    fn list_known_stations(&self, zone: Option<&str>) -> Result<Vec<StationRecord>, StatusError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StatusError::SourceUnavailable("memory source offline".to_string()));
        }
        Ok(crate::stations::in_zone(&state.roster, zone)
            .into_iter()
            .cloned()
            .collect())
    }

    fn list_live_readings(&self, station: Option<&str>) -> Result<Vec<LiveReading>, StatusError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StatusError::SourceUnavailable("memory source offline".to_string()));
        }
        Ok(match station {
            Some(id) => crate::analysis::latest_per_station(&state.readings)
                .into_iter()
                .filter(|r| r.station_id == id)
                .cloned()
                .collect(),
            None => state.readings.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Converts one stored parameter value to a number.
///
/// Numbers are taken as-is, numeric strings are parsed, booleans map to 1/0.
/// Anything else (null, NaN/inf, objects, text) is treated as absent.
pub fn decode_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// `true` for codes of the form `P<digits>`, e.g. `P4` or `P150`.
pub fn is_parameter_code(code: &str) -> bool {
    code.strip_prefix('P')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Decodes a JSON object of `P<n>` → value into a parameter map.
///
/// Keys outside the `P<n>` vocabulary are dropped; they would otherwise
/// collide with `station_id`/`timestamp` once the map is flattened onto the
/// wire. Values that are not usable numbers are dropped as well. A
/// non-object decodes to an empty map.
pub fn decode_parameters(raw: &Value) -> BTreeMap<String, f64> {
    raw.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(code, _)| is_parameter_code(code))
                .filter_map(|(code, v)| decode_value(v).map(|n| (code.clone(), n)))
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a `LiveReading` from raw row parts.
///
/// A row without a station id violates the live table contract and is
/// rejected with `InvalidInput`; missing or malformed parameters are not an
/// error.
pub fn decode_reading(
    station_id: &str,
    timestamp: DateTime<Utc>,
    raw_parameters: &Value,
) -> Result<LiveReading, StatusError> {
    let station_id = station_id.trim();
    if station_id.is_empty() {
        return Err(StatusError::InvalidInput(
            "live row has an empty station id".to_string(),
        ));
    }
    Ok(LiveReading {
        station_id: station_id.to_string(),
        timestamp,
        parameters: decode_parameters(raw_parameters),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
