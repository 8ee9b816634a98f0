use crate::errors::StoreError;
use crate::model::{AggregateSnapshot, ReadingFilter, TelemetryReading};
use async_trait::async_trait;

/// Durable collection of telemetry readings.
///
/// Implementations must allow reads to run concurrently with inserts.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Appends one reading as a new record.
    async fn insert(&self, reading: &TelemetryReading) -> Result<(), StoreError>;

    /// Up to `limit` readings, newest `timestamp` first; equal timestamps are
    /// ordered by insertion, latest insert first.
    async fn recent(&self, limit: u32) -> Result<Vec<TelemetryReading>, StoreError>;

    /// Means of temperature, humidity and pollution over the matching readings.
    async fn averages(&self, filter: &ReadingFilter) -> Result<AggregateSnapshot, StoreError>;

    async fn close(&self) {}
}
