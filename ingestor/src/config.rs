use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use telemetry::config::{
    parse_broker_list, validate_database_url, validate_group_id, validate_topic, BrokerAddress,
};
use telemetry::errors::ConfigError;

#[derive(Debug, Clone, Parser)]
#[command(name = "ingestor", about = "Consumes telemetry from the broker and persists it")]
pub struct Args {
    /// Comma-separated list of MQTT brokers (host or host:port)
    #[arg(long, env = "BROKER_ADDRESSES")]
    pub broker_addresses: String,

    #[arg(long, env = "TELEMETRY_TOPIC")]
    pub topic: String,

    /// Instances sharing a group divide the topic's messages between them
    #[arg(long, env = "CONSUMER_GROUP", default_value = "telemetry-consumer-group")]
    pub consumer_group: String,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "STARTUP_TIMEOUT_SECS", default_value_t = 10)]
    pub startup_timeout_secs: u64,

    /// Optional address for the Prometheus `/metrics` endpoint
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub brokers: Vec<BrokerAddress>,
    pub topic: String,
    pub consumer_group: String,
    pub database_url: String,
    pub startup_timeout: Duration,
    pub metrics_addr: Option<SocketAddr>,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        validate_topic(&args.topic)?;
        validate_group_id(&args.consumer_group)?;
        validate_database_url(&args.database_url)?;
        let brokers = parse_broker_list(&args.broker_addresses)?;

        if args.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "startup timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Config {
            brokers,
            topic: args.topic,
            consumer_group: args.consumer_group,
            database_url: args.database_url,
            startup_timeout: Duration::from_secs(args.startup_timeout_secs),
            metrics_addr: args.metrics_addr,
        })
    }
}
