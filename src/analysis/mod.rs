/// Fleet status derivation for the pump-station monitoring service.
///
/// Everything in here is a pure function of a telemetry snapshot: no I/O,
/// no clocks (callers pass `now`), no shared state. Consumers may call these
/// concurrently without synchronization.
///
/// Submodules:
/// - `latest`: reduces a raw snapshot to one reading per station.
/// - `summary`: the fleet counters served on `/status`.
/// - `health`: freshness-based health figures served on `/fleet-health`.

pub mod health;
pub mod latest;
pub mod summary;

pub use health::{fleet_health, system_health};
pub use latest::latest_per_station;
pub use summary::{aggregate, aggregate_with};
