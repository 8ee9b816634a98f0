use crate::errors::BrokerError;
use async_trait::async_trait;

/// Producer side of the telemetry topic.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Hands one serialized reading to the broker.
    async fn publish(&self, payload: String) -> Result<(), BrokerError>;

    /// Releases the broker connection.
    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Consumer side of the telemetry topic.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Waits for the next message payload.
    ///
    /// Returns `Ok(None)` once the subscription has been closed cleanly and an
    /// error when the broker connection is lost.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError> {
        Ok(())
    }
}
