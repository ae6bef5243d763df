/// Core data types for the pump-station monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// live telemetry rows, roster entries, the derived fleet summary and the
/// error type. It contains no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// Ambient temperature at the station cabinet.
pub const PARAM_TEMPERATURE: &str = "P1";

/// Supply voltage. Drives the power available / power failed counters.
pub const PARAM_VOLTAGE: &str = "P4";

/// Pump running flag (>0 running, 0 stopped).
pub const PARAM_PUMP_RUNNING: &str = "P46";

/// Pump control mode (nonzero auto, 0 manual).
pub const PARAM_PUMP_MODE: &str = "P47";

/// Water level in the overhead tank.
pub const PARAM_WATER_LEVEL: &str = "P69";

/// Supply feed A.
pub const PARAM_POWER_FEED_A: &str = "P106";

/// Supply feed B.
pub const PARAM_POWER_FEED_B: &str = "P107";

/// Delivery flow rate.
pub const PARAM_FLOW_RATE: &str = "P150";

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// The most recent telemetry sample known for one station.
///
/// Parameters are keyed by their `P<n>` code. A station may omit any
/// parameter; absence is not an error, it only excludes the station from
/// the counters that depend on that parameter.
///
/// Serialized flat, matching the live table layout:
/// `{"station_id": "TW-01", "timestamp": "...", "P4": 231.0, "P46": 1.0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, f64>,
}

impl LiveReading {
    pub fn new(station_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style setter, mostly useful for fixtures and tests.
    pub fn with_parameter(mut self, code: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(code.into(), value);
        self
    }

    pub fn parameter(&self, code: &str) -> Option<f64> {
        self.parameters.get(code).copied()
    }
}

// ---------------------------------------------------------------------------
// Roster types
// ---------------------------------------------------------------------------

/// One entry of the station roster (the authoritative list of known stations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub station_id: String,
    pub name: String,
    /// Administrative zone the station belongs to.
    pub zone: String,
    #[serde(default)]
    pub station_type: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

// ---------------------------------------------------------------------------
// Derived types
// ---------------------------------------------------------------------------

/// Fleet-wide operational counters derived from one snapshot of live readings.
///
/// Field names on the wire follow the dashboard contract (`total_tw`,
/// `power_avail`, ...). Every count is bounded by `total_stations`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusSummary {
    #[serde(rename = "total_tw")]
    pub total_stations: usize,
    #[serde(rename = "power_avail")]
    pub power_available: usize,
    #[serde(rename = "power_fail")]
    pub power_failed: usize,
    #[serde(rename = "active_sites")]
    pub active_stations: usize,
    #[serde(rename = "inactive_sites")]
    pub inactive_stations: usize,
    pub auto_mode: usize,
    pub manual_mode: usize,
    #[serde(rename = "pump_on")]
    pub pumps_on: usize,
    #[serde(rename = "pump_off")]
    pub pumps_off: usize,
    pub trip_sites: usize,
}

/// Freshness-based health figures for the fleet at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub total_stations: usize,
    /// Stations whose reading is inside the online window.
    pub online_stations: usize,
    /// Stations whose reading is inside the (shorter) network window.
    pub network_online: usize,
    /// `round(100 * online / total)`, 0 for an empty fleet.
    pub system_health: u8,
    /// Stations reporting both supply feeds live.
    pub dual_feed_power: usize,
    pub evaluated_at: DateTime<Utc>,
}

/// Parameter codes the aggregator reads its counters from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterKeys {
    pub pump_running: String,
    pub pump_mode: String,
    pub power: String,
    /// Trip/fault flag. Without one, `trip_sites` is always 0.
    pub trip: Option<String>,
}

impl Default for ParameterKeys {
    fn default() -> Self {
        Self {
            pump_running: PARAM_PUMP_RUNNING.to_string(),
            pump_mode: PARAM_PUMP_MODE.to_string(),
            power: PARAM_VOLTAGE.to_string(),
            trip: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while fetching, decoding or serving station telemetry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusError {
    /// The telemetry source could not be reached or timed out.
    #[error("telemetry source unavailable: {0}")]
    SourceUnavailable(String),
    /// A caller broke the input contract (e.g. a row without a station id).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The source was reachable but the query failed.
    #[error("query failed: {0}")]
    Query(String),
    /// Non-2xx response from the status API.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// A response or file body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<postgres::Error> for StatusError {
    fn from(err: postgres::Error) -> Self {
        // Closed connections and connect failures carry no server-side error.
        if err.is_closed() || err.as_db_error().is_none() {
            StatusError::SourceUnavailable(err.to_string())
        } else {
            StatusError::Query(err.to_string())
        }
    }
}

impl From<reqwest::Error> for StatusError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StatusError::Http(status.as_u16()),
            None if err.is_decode() => StatusError::Parse(err.to_string()),
            None => StatusError::SourceUnavailable(err.to_string()),
        }
    }
}
