//! Service configuration.
//!
//! Loaded from a TOML file (default `./pumpmon.toml`). Every section and key
//! is optional; a missing file yields the defaults. After the file is read,
//! `.env` is loaded and `DATABASE_URL` / `PUMPMON_BIND` override it.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [database]
//! url = "postgres://pumpmon@localhost/pumpmon_db"
//!
//! [freshness]
//! online_window_minutes = 5
//! network_window_minutes = 2
//!
//! [polling]
//! summary_interval_secs = 30
//! live_interval_secs = 5
//!
//! [parameters]
//! trip = "P48"
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::DbSettings;
use crate::freshness::FreshnessPolicy;
use crate::logging::LogLevel;
use crate::model::{ParameterKeys, StatusError};

pub const DEFAULT_CONFIG_PATH: &str = "./pumpmon.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub database: DbSettings,
    pub freshness: FreshnessPolicy,
    pub polling: PollingSettings,
    pub parameters: ParameterKeys,
    pub logging: LogSettings,
    pub dev_mode: Option<DevModeSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Consumer cadences. The aggregation itself is interval-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Fleet summary bar refresh.
    pub summary_interval_secs: u64,
    /// Single-station live view refresh.
    pub live_interval_secs: u64,
    /// Upper bound for one in-flight fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            summary_interval_secs: 30,
            live_interval_secs: 5,
            fetch_timeout_secs: 10,
        }
    }
}

impl PollingSettings {
    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs.max(1))
    }

    pub fn live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub file: Option<String>,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
        }
    }
}

/// When present, the service serves a fixture file instead of the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevModeSettings {
    pub fixture: String,
    /// Shift fixture timestamps so the newest reading is "now".
    #[serde(default = "default_rebase")]
    pub rebase_to_now: bool,
}

fn default_rebase() -> bool {
    true
}

impl Config {
    /// Reads `path` (if it exists), then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StatusError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = fs::read_to_string(path).map_err(|e| {
                StatusError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_toml(&text)?
        } else {
            Config::default()
        };

        dotenv::dotenv().ok();
        config.apply_overrides(env::var("DATABASE_URL").ok(), env::var("PUMPMON_BIND").ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, StatusError> {
        toml::from_str(text).map_err(|e| StatusError::Config(e.to_string()))
    }

    fn apply_overrides(&mut self, database_url: Option<String>, bind: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            self.database.url = url;
        }
        if let Some(bind) = bind.filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind;
        }
    }
}
