/// PostgreSQL connection handling.
///
/// The service never keeps a connection between calls: every read acquires a
/// fresh `Session`, and the session is released when it goes out of scope
/// (including on error paths). Pooling, if wanted, belongs in front of the
/// database (pgbouncer), not in this process.

use std::env;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use postgres::{Client, NoTls};
use serde::{Deserialize, Serialize};

use crate::model::StatusError;

/// Connection settings, usually loaded from the `[database]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url: "postgres://pumpmon@localhost/pumpmon_db".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

/// Entry point for acquiring sessions against the telemetry database.
#[derive(Debug, Clone)]
pub struct Database {
    settings: DbSettings,
}

impl Database {
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }

    /// Builds settings from `DATABASE_URL` (after loading `.env`).
    pub fn from_env() -> Result<Self, StatusError> {
        dotenv::dotenv().ok();
        let url = env::var("DATABASE_URL")
            .map_err(|_| StatusError::Config("DATABASE_URL must be set".to_string()))?;
        Ok(Self::new(DbSettings {
            url,
            ..DbSettings::default()
        }))
    }

    /// Opens a new session. Fails with `SourceUnavailable` when the server
    /// cannot be reached within the connect timeout.
    pub fn acquire(&self) -> Result<Session, StatusError> {
        let mut config: postgres::Config = self
            .settings
            .url
            .parse()
            .map_err(|e: postgres::Error| StatusError::Config(format!("invalid database url: {}", e)))?;
        config.connect_timeout(Duration::from_secs(self.settings.connect_timeout_secs));

        let client = config
            .connect(NoTls)
            .map_err(|e| StatusError::SourceUnavailable(e.to_string()))?;
        Ok(Session { client })
    }

    /// Acquires a session and checks that every schema in `schemas` exists.
    ///
    /// Used at startup and by integration tests to fail early with a readable
    /// message when migrations have not been applied.
    pub fn connect_and_verify(&self, schemas: &[&str]) -> Result<Session, StatusError> {
        let mut session = self.acquire()?;
        for schema in schemas {
            let row = session.query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
                &[schema],
            )?;
            let exists: bool = row.try_get(0)?;
            if !exists {
                return Err(StatusError::Config(format!(
                    "schema '{}' not found; apply sql/001_telemetry_schema.sql",
                    schema
                )));
            }
        }
        Ok(session)
    }
}

/// A scoped database session. Dropping it closes the connection.
pub struct Session {
    client: Client,
}

impl Session {
    /// Closes the connection explicitly, surfacing any shutdown error.
    pub fn release(self) -> Result<(), StatusError> {
        self.client.close().map_err(StatusError::from)
    }
}

impl Deref for Session {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}
