/// Status API client
///
/// Used by display consumers (and the `pumpmon watch` command) to pull the
/// fleet summary and single-station live rows from a running service.

use std::time::Duration;

use reqwest::{IntoUrl, Url};
use serde::de::DeserializeOwned;

use crate::model::{LiveReading, StatusError, StatusSummary};

#[derive(Debug, Clone)]
pub struct StatusClient {
    http: reqwest::Client,
    base_url: String,
}

impl StatusClient {
    /// `base_url` is the service root, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StatusError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StatusError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}/status", self.base_url)
    }

    /// `/live-data` with the station id form-encoded into the query.
    pub fn live_data_url(&self, station: &str) -> Result<Url, StatusError> {
        Url::parse_with_params(&format!("{}/live-data", self.base_url), &[("station", station)])
            .map_err(|e| StatusError::Config(format!("invalid base url '{}': {}", self.base_url, e)))
    }

    pub async fn fetch_status(&self) -> Result<StatusSummary, StatusError> {
        self.get_json(self.status_url()).await
    }

    /// Latest row for one station; empty if the station has not reported.
    pub async fn fetch_live(&self, station: &str) -> Result<Vec<LiveReading>, StatusError> {
        self.get_json(self.live_data_url(station)?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: impl IntoUrl) -> Result<T, StatusError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StatusError::Http(response.status().as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StatusError::Parse(e.to_string()))
    }
}
