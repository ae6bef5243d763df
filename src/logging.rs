/// Structured logging for the pump-station monitoring service
///
/// Thin layer over `tracing`: every event carries the data source and, when
/// relevant, the station id as structured fields. Output goes to stdout or
/// an append-only file, as plain text or JSON.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt as tracing_fmt};

use crate::model::StatusError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(StatusError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Database,
    Fixture,
    Api,
    Poller,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Database => write!(f, "DB"),
            DataSource::Fixture => write!(f, "FIXTURE"),
            DataSource::Api => write!(f, "API"),
            DataSource::Poller => write!(f, "POLL"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. a station that simply has no live row yet
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not (often transient)
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `min_level`. With `log_file`
/// the output is appended to that file (no ANSI colours). Returns an error if
/// the file cannot be opened or a subscriber is already installed.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, json: bool) -> Result<(), StatusError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_directive()));

    let output: Box<dyn Layer<Registry> + Send + Sync> = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| StatusError::Config(format!("cannot open log file {}: {}", path, e)))?;
            let layer = tracing_fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file));
            if json { layer.json().boxed() } else { layer.boxed() }
        }
        None => {
            let layer = tracing_fmt::layer().with_target(true);
            if json { layer.json().boxed() } else { layer.boxed() }
        }
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| StatusError::Config(format!("logger already initialized: {}", e)))
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, station: Option<&str>, message: &str) {
    tracing::info!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, station: Option<&str>, message: &str) {
    tracing::warn!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, station: Option<&str>, message: &str) {
    tracing::error!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, station: Option<&str>, message: &str) {
    tracing::debug!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a telemetry/API failure to decide how loudly to report it.
pub fn classify_failure(err: &StatusError) -> FailureType {
    match err {
        // Timeouts come and go with the field network.
        StatusError::SourceUnavailable(msg) if msg.contains("timed out") => FailureType::Unknown,
        StatusError::SourceUnavailable(_) => FailureType::Unexpected,
        StatusError::Http(404) => FailureType::Expected,
        StatusError::Http(code) if *code >= 500 => FailureType::Unexpected,
        StatusError::Http(_) => FailureType::Unknown,
        StatusError::InvalidInput(_)
        | StatusError::Query(_)
        | StatusError::Parse(_)
        | StatusError::Config(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed operation against a data source with automatic classification
pub fn log_source_failure(source: DataSource, station: Option<&str>, operation: &str, err: &StatusError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, station, &message),
        FailureType::Unexpected => error(source, station, &message),
        FailureType::Unknown => warn(source, station, &message),
    }
}

// ---------------------------------------------------------------------------
// Coverage Summary Logging
// ---------------------------------------------------------------------------

/// Log how many of `total` stations produced usable data in one pass
pub fn log_coverage_summary(source: DataSource, total: usize, reporting: usize, missing: usize) {
    let message = format!(
        "Coverage: {}/{} stations reporting, {} missing",
        reporting, total, missing
    );

    if missing == 0 {
        info(source, None, &message);
    } else if reporting == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}
