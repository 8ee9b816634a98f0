use crate::generator::Generator;
use std::time::Duration;
use telemetry::{TelemetryReading, TelemetrySink};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub skipped: u64,
}

/// Publishes one generated reading per tick until `shutdown` is cancelled.
///
/// A failed tick is logged and skipped; the same reading is never retried.
pub async fn run_publisher<S>(
    sink: &S,
    generator: &Generator,
    period: Duration,
    shutdown: &CancellationToken,
) -> PublishStats
where
    S: TelemetrySink + ?Sized,
{
    info!("Publishing one reading every {:?}", period);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = PublishStats::default();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reading = generator.generate(&mut rand::thread_rng());
        if publish_reading(sink, &reading).await {
            stats.published += 1;
        } else {
            stats.skipped += 1;
        }

        if (stats.published + stats.skipped) % PROGRESS_EVERY == 0 {
            info!(
                "Published {} readings ({} skipped)",
                stats.published, stats.skipped
            );
        }
    }

    info!(
        "Publisher stopped after {} readings ({} skipped)",
        stats.published, stats.skipped
    );
    stats
}

/// Serializes and publishes a single reading. Returns whether it was handed to the broker.
pub async fn publish_reading<S>(sink: &S, reading: &TelemetryReading) -> bool
where
    S: TelemetrySink + ?Sized,
{
    let payload = match serde_json::to_string(reading) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to serialize telemetry: {}", e);
            return false;
        }
    };

    match sink.publish(payload).await {
        Ok(()) => {
            debug!("Published reading from {}", reading.sensor_id);
            true
        }
        Err(e) => {
            warn!(
                "Failed to publish reading from {}, skipping tick: {}",
                reading.sensor_id, e
            );
            false
        }
    }
}
