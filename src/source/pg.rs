/// PostgreSQL-backed telemetry source.
///
/// Reads the roster from `telemetry.stations` and the live table from
/// `telemetry.live_readings` (schema in `sql/001_telemetry_schema.sql`).
/// Each call acquires its own session and releases it before returning.

use chrono::{DateTime, Utc};
use postgres::Row;
use serde_json::Value;

use crate::db::Database;
use crate::logging::{self, DataSource};
use crate::model::{LiveReading, StationRecord, StatusError};
use crate::source::{TelemetrySource, decode_reading};

const ROSTER_ALL: &str = "
    SELECT station_id, name, zone, station_type, latitude, longitude
    FROM telemetry.stations
    ORDER BY station_id
";

const ROSTER_BY_ZONE: &str = "
    SELECT station_id, name, zone, station_type, latitude, longitude
    FROM telemetry.stations
    WHERE lower(zone) = lower($1)
    ORDER BY station_id
";

// DISTINCT ON keeps the latest row per station even if ingestion ever
// leaves more than one behind.
const LIVE_ALL: &str = "
    SELECT DISTINCT ON (station_id) station_id, reading_time, parameters
    FROM telemetry.live_readings
    ORDER BY station_id, reading_time DESC
";

const LIVE_ONE: &str = "
    SELECT station_id, reading_time, parameters
    FROM telemetry.live_readings
    WHERE station_id = $1
    ORDER BY reading_time DESC
    LIMIT 1
";

pub struct PgTelemetrySource {
    db: Database,
}

impl PgTelemetrySource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl TelemetrySource for PgTelemetrySource {
    fn list_known_stations(&self, zone: Option<&str>) -> Result<Vec<StationRecord>, StatusError> {
        let mut session = self.db.acquire()?;
        let rows = match zone {
            Some(zone) => session.query(ROSTER_BY_ZONE, &[&zone])?,
            None => session.query(ROSTER_ALL, &[])?,
        };
        rows.iter().map(station_from_row).collect()
    }

    fn list_live_readings(&self, station: Option<&str>) -> Result<Vec<LiveReading>, StatusError> {
        let mut session = self.db.acquire()?;
        let rows = match station {
            Some(station) => session.query(LIVE_ONE, &[&station])?,
            None => session.query(LIVE_ALL, &[])?,
        };

        let mut readings = Vec::with_capacity(rows.len());
        for row in &rows {
            match reading_from_row(row) {
                Ok(reading) => readings.push(reading),
                // One broken row must not hide the rest of the fleet.
                Err(err @ StatusError::InvalidInput(_)) => {
                    logging::log_source_failure(DataSource::Database, None, "decode live row", &err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(readings)
    }
}

fn station_from_row(row: &Row) -> Result<StationRecord, StatusError> {
    Ok(StationRecord {
        station_id: row.try_get("station_id")?,
        name: row.try_get("name")?,
        zone: row.try_get("zone")?,
        station_type: row.try_get("station_type")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
    })
}

fn reading_from_row(row: &Row) -> Result<LiveReading, StatusError> {
    let station_id: String = row.try_get("station_id")?;
    let timestamp: DateTime<Utc> = row.try_get("reading_time")?;
    let parameters: Option<Value> = row.try_get("parameters")?;
    decode_reading(&station_id, timestamp, &parameters.unwrap_or(Value::Null))
}
