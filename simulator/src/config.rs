use clap::Parser;
use std::time::Duration;
use telemetry::config::{parse_broker_list, validate_topic, BrokerAddress};
use telemetry::errors::ConfigError;

#[derive(Debug, Clone, Parser)]
#[command(name = "simulator", about = "Publishes synthetic sensor telemetry to the broker")]
pub struct Args {
    /// Comma-separated list of MQTT brokers (host or host:port)
    #[arg(long, env = "BROKER_ADDRESSES")]
    pub broker_addresses: String,

    /// Topic the readings are published to
    #[arg(long, env = "TELEMETRY_TOPIC")]
    pub topic: String,

    #[arg(long, env = "PUBLISH_INTERVAL_MS", default_value_t = 3000)]
    pub publish_interval_ms: u64,

    #[arg(long, env = "STARTUP_TIMEOUT_SECS", default_value_t = 10)]
    pub startup_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub brokers: Vec<BrokerAddress>,
    pub topic: String,
    pub publish_interval: Duration,
    pub startup_timeout: Duration,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        validate_topic(&args.topic)?;
        let brokers = parse_broker_list(&args.broker_addresses)?;

        if args.publish_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "publish interval",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        if args.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "startup timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Config {
            brokers,
            topic: args.topic,
            publish_interval: Duration::from_millis(args.publish_interval_ms),
            startup_timeout: Duration::from_secs(args.startup_timeout_secs),
        })
    }
}
