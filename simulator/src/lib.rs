pub mod config;
pub mod errors;
pub mod generator;
pub mod publisher;

use config::{Args, Config};
use errors::Result;
use generator::Generator;
use publisher::{run_publisher, PublishStats};
use std::future::Future;
use telemetry::config::format_broker_list;
use telemetry::errors::BrokerError;
use telemetry::TelemetrySink;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Validates the configuration, connects through `connect`, then publishes until
/// `shutdown` is cancelled.
///
/// Nothing is connected when the configuration is invalid.
pub async fn launch<F, Fut, S>(
    args: Args,
    shutdown: CancellationToken,
    connect: F,
) -> Result<PublishStats>
where
    F: FnOnce(Config) -> Fut,
    Fut: Future<Output = std::result::Result<S, BrokerError>>,
    S: TelemetrySink,
{
    let config = Config::try_from(args)?;
    info!(
        "Broker(s): {}, topic: {}, interval: {:?}",
        format_broker_list(&config.brokers),
        config.topic,
        config.publish_interval
    );

    let sink = connect(config.clone()).await?;
    info!("Connected to MQTT broker, starting to publish telemetry");

    let stats = run_publisher(&sink, &Generator::default(), config.publish_interval, &shutdown).await;

    if let Err(e) = sink.close().await {
        warn!("Failed to close broker connection: {}", e);
    }
    Ok(stats)
}
