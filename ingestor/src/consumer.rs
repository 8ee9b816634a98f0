use crate::errors::Result;
use crate::metrics::{
    DB_FAILURES_TOTAL, INVALID_MESSAGES_TOTAL, MALFORMED_MESSAGES_TOTAL, MESSAGES_TOTAL,
    PERSISTED_TOTAL, PERSIST_LATENCY_SECONDS,
};
use crate::validate::{validate, Validation};
use serde_json::Value;
use telemetry::{TelemetrySource, TelemetryStore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest slice of a rejected payload that is written to the log.
const LOGGED_PAYLOAD_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Persisted,
    /// Not decodable as a JSON object.
    Malformed,
    /// Decoded, but failed validation.
    Invalid,
    /// Valid, but the insert failed; the reading is dropped.
    PersistFailed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub persisted: u64,
    pub malformed: u64,
    pub invalid: u64,
    pub persist_failed: u64,
}

impl ConsumerStats {
    pub fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Persisted => self.persisted += 1,
            MessageOutcome::Malformed => self.malformed += 1,
            MessageOutcome::Invalid => self.invalid += 1,
            MessageOutcome::PersistFailed => self.persist_failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.persisted + self.malformed + self.invalid + self.persist_failed
    }
}

/// Consumes messages one at a time until `shutdown` is cancelled or the
/// subscription ends.
///
/// A message is finished (persisted or dropped) before the next one is
/// requested. Losing the broker connection is returned as an error.
pub async fn run_consumer<S>(
    source: &mut S,
    store: &dyn TelemetryStore,
    shutdown: &CancellationToken,
) -> Result<ConsumerStats>
where
    S: TelemetrySource + ?Sized,
{
    let mut stats = ConsumerStats::default();
    info!("Consumer started, waiting for messages");

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, consumer stopping");
                break;
            }
            message = source.next_message() => message,
        };

        match message {
            Ok(Some(payload)) => stats.record(process_message(&payload, store).await),
            Ok(None) => {
                info!("Subscription closed");
                break;
            }
            Err(e) => {
                error!(
                    "Lost broker connection after {} messages: {}",
                    stats.total(),
                    e
                );
                return Err(e.into());
            }
        }
    }

    info!(
        "Consumer stopped: {} persisted, {} malformed, {} invalid, {} dropped on store failure",
        stats.persisted, stats.malformed, stats.invalid, stats.persist_failed
    );
    Ok(stats)
}

/// Decodes, validates and persists one message. Never retries.
pub async fn process_message(payload: &[u8], store: &dyn TelemetryStore) -> MessageOutcome {
    MESSAGES_TOTAL.inc();

    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Skipping malformed message ({}): {}",
                e,
                excerpt(payload)
            );
            MALFORMED_MESSAGES_TOTAL.inc();
            return MessageOutcome::Malformed;
        }
    };

    let reading = match validate(&value) {
        Validation::Valid(reading) => reading,
        Validation::Invalid(reason) => {
            warn!("Skipping invalid reading ({}): {}", reason, excerpt(payload));
            INVALID_MESSAGES_TOTAL.inc();
            return MessageOutcome::Invalid;
        }
    };

    let start = Instant::now();
    match store.insert(&reading).await {
        Ok(()) => {
            PERSIST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
            PERSISTED_TOTAL.inc();
            debug!(
                "Persisted reading from {} at {}",
                reading.sensor_id, reading.timestamp
            );
            MessageOutcome::Persisted
        }
        Err(e) => {
            error!(
                "Failed to persist reading from {} at {}, dropping it: {}",
                reading.sensor_id, reading.timestamp, e
            );
            DB_FAILURES_TOTAL.inc();
            MessageOutcome::PersistFailed
        }
    }
}

fn excerpt(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(LOGGED_PAYLOAD_BYTES)];
    let mut text = String::from_utf8_lossy(shown).into_owned();
    if payload.len() > LOGGED_PAYLOAD_BYTES {
        text.push_str(&format!("... ({} bytes)", payload.len()));
    }
    text
}
