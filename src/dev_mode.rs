/// Development mode: serve a fixture file instead of the live database
///
/// When the telemetry database is unavailable, point `[dev_mode] fixture`
/// at a JSON snapshot. Timestamps can be rebased on every read so the newest
/// reading always looks current, which keeps freshness metrics meaningful.
///
/// Fixture format:
/// ```json
/// {
///   "stations": [{"station_id": "TW-01", "name": "...", "zone": "North"}],
///   "readings": [{"station_id": "TW-01", "timestamp": "2024-05-01T12:58:00Z",
///                 "parameters": {"P4": 231, "P46": 1}}]
/// }
/// ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{LiveReading, StationRecord, StatusError};
use crate::source::{TelemetrySource, decode_reading};

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    stations: Vec<StationRecord>,
    #[serde(default)]
    readings: Vec<RawReading>,
}

#[derive(Debug, Deserialize)]
struct RawReading {
    station_id: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    parameters: Value,
}

/// Telemetry source backed by a fixture snapshot.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    stations: Vec<StationRecord>,
    readings: Vec<LiveReading>,
    rebase_to_now: bool,
}

impl FixtureSource {
    /// Loads a fixture file from disk.
    pub fn load(path: impl AsRef<Path>, rebase_to_now: bool) -> Result<Self, StatusError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| StatusError::Config(format!("cannot read fixture {}: {}", path.display(), e)))?;
        Self::from_json(&text, rebase_to_now)
    }

    /// Parses fixture JSON. Rows with a blank station id are rejected.
    pub fn from_json(text: &str, rebase_to_now: bool) -> Result<Self, StatusError> {
        let file: FixtureFile =
            serde_json::from_str(text).map_err(|e| StatusError::Parse(e.to_string()))?;
        let readings = file
            .readings
            .iter()
            .map(|raw| decode_reading(&raw.station_id, raw.timestamp, &raw.parameters))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            stations: file.stations,
            readings,
            rebase_to_now,
        })
    }

    /// Readings as they would look at instant `now`.
    ///
    /// With rebasing on, every timestamp is shifted by the same offset so the
    /// newest reading lands exactly on `now`; relative ages are preserved.
    pub fn readings_at(&self, now: DateTime<Utc>) -> Vec<LiveReading> {
        let newest = self.readings.iter().map(|r| r.timestamp).max();
        match newest {
            Some(newest) if self.rebase_to_now => {
                let offset = now - newest;
                self.readings
                    .iter()
                    .map(|r| LiveReading {
                        timestamp: r.timestamp + offset,
                        ..r.clone()
                    })
                    .collect()
            }
            _ => self.readings.clone(),
        }
    }
}

impl TelemetrySource for FixtureSource {
    fn list_known_stations(&self, zone: Option<&str>) -> Result<Vec<StationRecord>, StatusError> {
        Ok(crate::stations::in_zone(&self.stations, zone)
            .into_iter()
            .cloned()
            .collect())
    }

    fn list_live_readings(&self, station: Option<&str>) -> Result<Vec<LiveReading>, StatusError> {
        let readings = self.readings_at(Utc::now());
        Ok(match station {
            Some(id) => crate::analysis::latest_per_station(&readings)
                .into_iter()
                .filter(|r| r.station_id == id)
                .cloned()
                .collect(),
            None => readings,
        })
    }
}
