/// One status cycle: fetch from the telemetry source, then derive.
///
/// The pipeline holds no snapshot between calls. Each call reads the roster
/// and the live table afresh; if either read fails the cycle is abandoned
/// and the error is returned, and nothing is aggregated for that cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analysis::{aggregate_with, fleet_health};
use crate::freshness::FreshnessPolicy;
use crate::logging::{self, DataSource};
use crate::model::{HealthMetrics, LiveReading, ParameterKeys, StationRecord, StatusError, StatusSummary};
use crate::source::TelemetrySource;
use crate::stations;

/// Roster and live rows read in one cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub roster: Vec<StationRecord>,
    pub readings: Vec<LiveReading>,
}

#[derive(Clone)]
pub struct StatusPipeline {
    source: Arc<dyn TelemetrySource>,
    origin: DataSource,
    keys: ParameterKeys,
    freshness: FreshnessPolicy,
}

impl StatusPipeline {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        origin: DataSource,
        keys: ParameterKeys,
        freshness: FreshnessPolicy,
    ) -> Self {
        Self {
            source,
            origin,
            keys,
            freshness,
        }
    }

    /// Reads the full roster and the current live rows.
    pub fn snapshot(&self) -> Result<Snapshot, StatusError> {
        let roster = self
            .source
            .list_known_stations(None)
            .inspect_err(|e| logging::log_source_failure(self.origin, None, "list stations", e))?;
        let readings = self
            .source
            .list_live_readings(None)
            .inspect_err(|e| logging::log_source_failure(self.origin, None, "list live readings", e))?;

        // Every consumer hits this each cycle; `pumpmon verify` reports these at warn.
        for dup in stations::duplicate_ids(&roster) {
            logging::debug(self.origin, Some(dup), "station listed more than once in roster");
        }
        for unknown in stations::unknown_stations(&roster, &readings) {
            logging::debug(self.origin, Some(unknown), "live reading from station missing in roster");
        }

        Ok(Snapshot { roster, readings })
    }

    /// Fleet counters for the current snapshot.
    pub fn summary(&self) -> Result<StatusSummary, StatusError> {
        let snapshot = self.snapshot()?;
        let summary = aggregate_with(
            &snapshot.readings,
            &stations::known_ids(&snapshot.roster),
            &self.keys,
        );
        logging::debug(
            self.origin,
            None,
            &format!(
                "summary: {} stations, {} active, {} pumps on",
                summary.total_stations, summary.active_stations, summary.pumps_on
            ),
        );
        Ok(summary)
    }

    /// Freshness-based health at instant `now`.
    pub fn health_at(&self, now: DateTime<Utc>) -> Result<HealthMetrics, StatusError> {
        let snapshot = self.snapshot()?;
        Ok(fleet_health(
            &snapshot.readings,
            &stations::known_ids(&snapshot.roster),
            &self.freshness,
            now,
        ))
    }

    /// Raw live rows, optionally narrowed to one station. Not aggregated.
    pub fn live_data(&self, station: Option<&str>) -> Result<Vec<LiveReading>, StatusError> {
        self.source
            .list_live_readings(station)
            .inspect_err(|e| logging::log_source_failure(self.origin, station, "list live readings", e))
    }

    /// Roster entries, optionally narrowed to one zone.
    pub fn stations(&self, zone: Option<&str>) -> Result<Vec<StationRecord>, StatusError> {
        self.source
            .list_known_stations(zone)
            .inspect_err(|e| logging::log_source_failure(self.origin, None, "list stations", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PARAM_PUMP_RUNNING, PARAM_VOLTAGE};
    use crate::source::MemorySource;
    use chrono::{Duration, TimeZone};
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn station(id: &str) -> StationRecord {
        StationRecord {
            station_id: id.to_string(),
            name: id.to_string(),
            zone: "North".to_string(),
            station_type: None,
            latitude: None,
            longitude: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn pipeline(source: Arc<MemorySource>) -> StatusPipeline {
        StatusPipeline::new(
            source,
            DataSource::System,
            ParameterKeys::default(),
            FreshnessPolicy::default(),
        )
    }

    #[test]
    fn test_summary_uses_roster_for_inactive_count() {
        let source = Arc::new(MemorySource::new(
            vec![station("S1"), station("S2"), station("S3")],
            vec![
                LiveReading::new("S1", now())
                    .with_parameter(PARAM_PUMP_RUNNING, 1.0)
                    .with_parameter(PARAM_VOLTAGE, 230.0),
                LiveReading::new("S2", now())
                    .with_parameter(PARAM_PUMP_RUNNING, 0.0)
                    .with_parameter(PARAM_VOLTAGE, 0.0),
            ],
        ));
        let summary = pipeline(source).summary().unwrap();
        assert_eq!(summary.total_stations, 3);
        assert_eq!(summary.active_stations, 2);
        assert_eq!(summary.inactive_stations, 1);
        assert_eq!(summary.pumps_on, 1);
        assert_eq!(summary.pumps_off, 1);
        assert_eq!(summary.power_available, 1);
        assert_eq!(summary.power_failed, 1);
    }

    #[test]
    fn test_unavailable_source_aborts_the_cycle() {
        let source = Arc::new(MemorySource::default());
        source.set_unavailable(true);
        let err = pipeline(source).summary().unwrap_err();
        assert!(matches!(err, StatusError::SourceUnavailable(_)));
    }

    #[test]
    fn test_health_counts_fresh_readings_against_roster() {
        let source = Arc::new(MemorySource::new(
            vec![station("S1"), station("S2")],
            vec![
                LiveReading::new("S1", now() - Duration::minutes(1)),
                LiveReading::new("S2", now() - Duration::minutes(20)),
            ],
        ));
        let health = pipeline(source).health_at(now()).unwrap();
        assert_eq!(health.online_stations, 1);
        assert_eq!(health.system_health, 50);
    }

    #[test]
    fn test_roster_anomalies_stay_below_warn_each_cycle() {
        let source = Arc::new(MemorySource::new(
            vec![station("S1"), station("S1")],
            vec![LiveReading::new("S1", now()), LiveReading::new("X9", now())],
        ));
        let pipeline = pipeline(source);

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..3 {
                pipeline.summary().unwrap();
            }
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.is_empty(), "unexpected warn output: {}", output);
    }
}
