//! Telemetry Source Verification
//!
//! Checks the configured source against its own roster: which known stations
//! have a live row, which status parameters each row is missing, and which
//! stations report without being in the roster.
//!
//! Run with `pumpmon verify` before pointing the dashboard at a new database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::latest_per_station;
use crate::logging::{self, DataSource};
use crate::model::{LiveReading, ParameterKeys, StationRecord, StatusError};
use crate::source::TelemetrySource;
use crate::stations;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub stations: Vec<StationVerification>,
    /// Stations with live rows but no roster entry.
    pub unknown_stations: Vec<String>,
    /// Station ids listed more than once in the roster (checked once each).
    pub duplicate_stations: Vec<String>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub partial: usize,
    pub failed: usize,
    pub unknown_reporting: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationVerification {
    pub station_id: String,
    pub name: String,
    pub zone: String,
    pub status: VerificationStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub parameters_expected: Vec<String>,
    pub parameters_missing: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

/// Parameter codes every live row should carry for the summary to be complete.
pub fn expected_parameters(keys: &ParameterKeys) -> Vec<String> {
    let mut expected = vec![keys.pump_running.clone(), keys.pump_mode.clone(), keys.power.clone()];
    if let Some(trip) = &keys.trip {
        expected.push(trip.clone());
    }
    expected
}

// ============================================================================
// Per-station check
// ============================================================================

pub fn verify_station(
    record: &StationRecord,
    reading: Option<&LiveReading>,
    expected: &[String],
) -> StationVerification {
    let mut result = StationVerification {
        station_id: record.station_id.clone(),
        name: record.name.clone(),
        zone: record.zone.clone(),
        status: VerificationStatus::Failed,
        last_seen: None,
        parameters_expected: expected.to_vec(),
        parameters_missing: Vec::new(),
        error_message: None,
    };

    let Some(reading) = reading else {
        result.error_message = Some("no live reading".to_string());
        return result;
    };

    result.last_seen = Some(reading.timestamp);
    result.parameters_missing = expected
        .iter()
        .filter(|code| reading.parameter(code).is_none())
        .cloned()
        .collect();

    result.status = if result.parameters_missing.is_empty() {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };
    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(
    source: &dyn TelemetrySource,
    keys: &ParameterKeys,
    origin: DataSource,
) -> Result<VerificationReport, StatusError> {
    let listed = source.list_known_stations(None)?;
    let roster = stations::unique_stations(&listed);
    let readings = source.list_live_readings(None)?;
    let latest = latest_per_station(&readings);
    let expected = expected_parameters(keys);

    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        stations: Vec::with_capacity(roster.len()),
        unknown_stations: stations::unknown_stations(&listed, &readings)
            .into_iter()
            .map(str::to_string)
            .collect(),
        duplicate_stations: stations::duplicate_ids(&listed)
            .into_iter()
            .map(str::to_string)
            .collect(),
        summary: VerificationSummary {
            total: roster.len(),
            ..Default::default()
        },
    };
    report.summary.unknown_reporting = report.unknown_stations.len();
    for dup in &report.duplicate_stations {
        logging::warn(origin, Some(dup), "station listed more than once in roster");
    }
    for unknown in &report.unknown_stations {
        logging::warn(origin, Some(unknown), "live reading from station missing in roster");
    }

    for record in roster {
        let reading = latest
            .iter()
            .copied()
            .find(|r| r.station_id == record.station_id);
        let result = verify_station(record, reading, &expected);

        match result.status {
            VerificationStatus::Success => report.summary.working += 1,
            VerificationStatus::PartialSuccess => {
                logging::warn(
                    origin,
                    Some(&result.station_id),
                    &format!("missing parameters {:?}", result.parameters_missing),
                );
                report.summary.partial += 1;
            }
            VerificationStatus::Failed => report.summary.failed += 1,
        }
        report.stations.push(result);
    }

    logging::log_coverage_summary(
        origin,
        report.summary.total,
        report.summary.working + report.summary.partial,
        report.summary.failed,
    );

    Ok(report)
}

pub fn print_summary(report: &VerificationReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("📊 SOURCE VERIFICATION ({})", report.timestamp);
    println!("═══════════════════════════════════════════════════════════");

    for station in &report.stations {
        match station.status {
            VerificationStatus::Success => println!("  ✓ {:<12} {}", station.station_id, station.name),
            VerificationStatus::PartialSuccess => println!(
                "  ⚠ {:<12} {} (missing: {})",
                station.station_id,
                station.name,
                station.parameters_missing.join(", ")
            ),
            VerificationStatus::Failed => println!(
                "  ✗ {:<12} {}: {}",
                station.station_id,
                station.name,
                station.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }

    if !report.unknown_stations.is_empty() {
        println!();
        println!("Reporting but not in roster: {}", report.unknown_stations.join(", "));
    }
    if !report.duplicate_stations.is_empty() {
        println!("Listed more than once in roster: {}", report.duplicate_stations.join(", "));
    }

    let s = &report.summary;
    let reporting = s.working + s.partial;
    let coverage = if s.total > 0 {
        (reporting as f64 / s.total as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!(
        "Stations: {}/{} reporting ({} complete, {} partial, {} silent)",
        reporting, s.total, s.working, s.partial, s.failed
    );
    println!("Coverage: {:.1}%", coverage);
    println!("═══════════════════════════════════════════════════════════");
}
