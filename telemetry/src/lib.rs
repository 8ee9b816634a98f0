//! Shared building blocks of the telemetry pipeline: the reading model, the
//! sensor catalog, configuration checks, and the broker and store seams with
//! their MQTT and Postgres implementations.

pub mod broker;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod model;
pub mod mqtt;
pub mod shutdown;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use broker::{TelemetrySink, TelemetrySource};
pub use model::{AggregateSnapshot, ReadingFilter, SensorStatus, TelemetryReading};
pub use store::TelemetryStore;
