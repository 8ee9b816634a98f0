use clap::Parser;
use std::time::Duration;
use telemetry::config::validate_database_url;
use telemetry::errors::ConfigError;

#[derive(Debug, Clone, Parser)]
#[command(name = "analytics", about = "Serves recent readings and aggregates over HTTP")]
pub struct Args {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "PORT", default_value_t = 5002)]
    pub port: u16,

    #[arg(long, env = "STARTUP_TIMEOUT_SECS", default_value_t = 10)]
    pub startup_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub startup_timeout: Duration,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        validate_database_url(&args.database_url)?;

        if args.port == 0 {
            return Err(ConfigError::Invalid {
                name: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if args.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "startup timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Config {
            database_url: args.database_url,
            port: args.port,
            startup_timeout: Duration::from_secs(args.startup_timeout_secs),
        })
    }
}
