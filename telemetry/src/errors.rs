use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("invalid {name} '{value}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidCharacters { name: &'static str, value: String },

    #[error("{name} is longer than {max} characters")]
    TooLong { name: &'static str, max: usize },

    #[error("invalid broker address '{0}', expected host or host:port")]
    InvalidBrokerAddress(String),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("could not connect to any broker in [{addresses}] within {timeout:?}")]
    ConnectTimeout { addresses: String, timeout: Duration },

    #[error("no broker reachable in [{addresses}]: {reason}")]
    Unreachable { addresses: String, reason: String },

    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("subscription to '{0}' rejected by broker")]
    SubscribeRejected(String),

    #[error("broker rejected message: {0}")]
    Rejected(String),

    #[error("broker connection closed")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
