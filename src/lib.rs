//! Pump-station status aggregation service.
//!
//! Reads the station roster and the live telemetry table, derives the fleet
//! status summary and health figures, and serves them over HTTP to polling
//! dashboard consumers.

pub mod analysis;
pub mod client;
pub mod config;
pub mod db;
pub mod dev_mode;
pub mod freshness;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod poller;
pub mod server;
pub mod source;
pub mod stations;
pub mod verify;
