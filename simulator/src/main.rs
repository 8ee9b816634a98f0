use clap::Parser;
use rand::Rng;
use simulator::config::Args;
use telemetry::errors::BrokerError;
use telemetry::mqtt::{self, MqttSink};
use telemetry::{logging, shutdown};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let args = Args::parse();
    info!("Starting IoT Simulator");

    let client_id = format!("sim-{}", rand::thread_rng().gen::<u32>());
    let shutdown = shutdown::signal_token();

    let result = simulator::launch(args, shutdown, |config| async move {
        let connection =
            mqtt::connect(&config.brokers, &client_id, true, config.startup_timeout).await?;
        Ok::<_, BrokerError>(MqttSink::spawn(connection, config.topic))
    })
    .await;

    match result {
        Ok(stats) => info!(
            "Simulator stopped: {} published, {} skipped",
            stats.published, stats.skipped
        ),
        Err(e) => {
            error!("Simulator failed: {}", e);
            std::process::exit(1);
        }
    }
}
