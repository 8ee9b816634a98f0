use clap::Parser;
use ingestor::config::{Args, Config};
use ingestor::consumer::run_consumer;
use ingestor::errors::Result;
use ingestor::metrics;
use telemetry::config::{format_broker_list, redact_url};
use telemetry::db::PgStore;
use telemetry::errors::BrokerError;
use telemetry::mqtt::{self, MqttSource};
use telemetry::{logging, shutdown, TelemetrySource, TelemetryStore};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let args = Args::parse();
    info!("Starting IoT Ingestor");

    if let Err(e) = run(args).await {
        error!("Ingestor failed: {}", e);
        std::process::exit(1);
    }

    info!("Shutting down");
}

async fn run(args: Args) -> Result<()> {
    let config = Config::try_from(args)?;
    info!(
        "MQTT broker(s): {}, topic: {}, group: {}",
        format_broker_list(&config.brokers),
        config.topic,
        config.consumer_group
    );
    info!("Database: {}", redact_url(&config.database_url));

    metrics::init_metrics()?;
    let metrics_listener = match config.metrics_addr {
        Some(addr) => Some(metrics::bind(addr).await?),
        None => None,
    };

    let store = PgStore::connect(&config.database_url, config.startup_timeout).await?;

    let mut source = match subscribe(&config).await {
        Ok(source) => source,
        Err(e) => {
            store.close().await;
            return Err(e.into());
        }
    };

    let shutdown = shutdown::signal_token();

    if let Some(listener) = metrics_listener {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(listener, token).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let outcome = run_consumer(&mut source, &store, &shutdown).await;

    shutdown.cancel();
    if let Err(e) = source.close().await {
        warn!("Failed to close broker connection: {}", e);
    }
    store.close().await;

    outcome.map(|stats| {
        info!(
            "Consumed {} messages ({} persisted)",
            stats.total(),
            stats.persisted
        )
    })
}

async fn subscribe(config: &Config) -> std::result::Result<MqttSource, BrokerError> {
    let client_id = format!("ingestor-{}", uuid::Uuid::new_v4());
    let connection =
        mqtt::connect(&config.brokers, &client_id, true, config.startup_timeout).await?;
    info!("Using broker {}", connection.address());
    MqttSource::subscribe(connection, &config.topic, &config.consumer_group).await
}
