use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::logging::{self, DataSource};
use crate::model::{HealthMetrics, LiveReading, StationRecord, StatusError, StatusSummary};
use crate::server::state::AppState;
use crate::stations::zone_filter;

/// A failed request. Only the generic message reaches the client.
#[derive(Debug)]
pub struct ApiError {
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn fail(route: &str, message: &'static str, err: StatusError) -> ApiError {
    logging::error(DataSource::Api, None, &format!("{} -> 500: {}", route, err));
    ApiError { message }
}

/// Runs a source-bound closure on the blocking pool; the database driver is synchronous.
async fn run_blocking<T, F>(f: F) -> Result<T, StatusError>
where
    F: FnOnce() -> Result<T, StatusError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StatusError::SourceUnavailable(format!("blocking task failed: {}", e)))?
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveDataQuery {
    pub station: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StationsQuery {
    pub zone: Option<String>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "pumpmon",
        "timestamp": Utc::now().to_rfc3339(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusSummary>, ApiError> {
    let pipeline = state.pipeline.clone();
    run_blocking(move || pipeline.summary())
        .await
        .map(Json)
        .map_err(|e| fail("GET /status", "Failed to fetch system status", e))
}

pub async fn live_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveDataQuery>,
) -> Result<Json<Vec<LiveReading>>, ApiError> {
    let pipeline = state.pipeline.clone();
    let station = query
        .station
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    run_blocking(move || pipeline.live_data(station.as_deref()))
        .await
        .map(Json)
        .map_err(|e| fail("GET /live-data", "Failed to fetch live data", e))
}

pub async fn stations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StationsQuery>,
) -> Result<Json<Vec<StationRecord>>, ApiError> {
    let pipeline = state.pipeline.clone();
    let zone = zone_filter(query.zone.as_deref()).map(str::to_string);
    run_blocking(move || pipeline.stations(zone.as_deref()))
        .await
        .map(Json)
        .map_err(|e| fail("GET /stations", "Failed to fetch stations", e))
}

pub async fn fleet_health(State(state): State<Arc<AppState>>) -> Result<Json<HealthMetrics>, ApiError> {
    let pipeline = state.pipeline.clone();
    run_blocking(move || pipeline.health_at(Utc::now()))
        .await
        .map(Json)
        .map_err(|e| fail("GET /fleet-health", "Failed to fetch fleet health", e))
}
