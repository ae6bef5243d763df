//! HTTP surface consumed by the dashboard.
//!
//! | Route                       | Body                                  |
//! |-----------------------------|---------------------------------------|
//! | `GET /status`               | `StatusSummary`                       |
//! | `GET /live-data?station=`   | raw live rows, not aggregated         |
//! | `GET /stations?zone=`       | roster entries                        |
//! | `GET /fleet-health`         | `HealthMetrics`                       |
//! | `GET /health`               | service liveness                      |
//!
//! Every failure is a 500 with a generic `{"error": ...}` body.

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;

use crate::logging::{self, DataSource};
use crate::model::StatusError;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .route("/live-data", get(handlers::live_data))
        .route("/stations", get(handlers::stations))
        .route("/fleet-health", get(handlers::fleet_health))
        .with_state(state)
}

/// Binds `bind_addr` and serves until the process is stopped.
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> Result<(), StatusError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| StatusError::Config(format!("cannot bind {}: {}", bind_addr, e)))?;
    logging::info(
        DataSource::System,
        None,
        &format!("status API listening on {}", bind_addr),
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StatusError::Config(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        logging::info(DataSource::System, None, "shutdown requested");
    }
}
