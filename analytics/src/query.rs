use crate::errors::QueryError;
use std::sync::Arc;
use telemetry::{AggregateSnapshot, ReadingFilter, TelemetryReading, TelemetryStore};

pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 1000;

/// Turns the caller's `limit` into the number of rows to fetch.
///
/// Absent means the default; zero or negative is rejected; anything above
/// the maximum is clamped.
pub fn resolve_limit(requested: Option<i64>) -> Result<u32, QueryError> {
    match requested {
        None => Ok(DEFAULT_RECENT_LIMIT),
        Some(n) if n <= 0 => Err(QueryError::InvalidLimit(n)),
        Some(n) => Ok(n.min(i64::from(MAX_RECENT_LIMIT)) as u32),
    }
}

/// Read-only queries over persisted readings. Holds no state of its own;
/// every call goes to the store.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn TelemetryStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    pub async fn recent(&self, limit: Option<i64>) -> Result<Vec<TelemetryReading>, QueryError> {
        let limit = resolve_limit(limit)?;
        Ok(self.store.recent(limit).await?)
    }

    pub async fn averages(&self, filter: &ReadingFilter) -> Result<AggregateSnapshot, QueryError> {
        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since > until {
                return Err(QueryError::InvalidWindow { since, until });
            }
        }
        Ok(self.store.averages(filter).await?)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
