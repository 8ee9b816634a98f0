use chrono::{DateTime, Utc};
use telemetry::errors::{ConfigError, StoreError};
use thiserror::Error;

/// Failures of a single query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("limit must be a positive integer, got {0}")]
    InvalidLimit(i64),

    #[error("since ({since}) is after until ({until})")]
    InvalidWindow {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("store query failed: {0}")]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Whether the caller, rather than the store, is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Store(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
