//! Validation of the externally supplied settings shared by the binaries.

use crate::errors::ConfigError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const MAX_NAME_LEN: usize = 249;

/// Topic names may only contain letters, digits, `.`, `_` and `-`.
pub fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    validate_name("topic", topic)
}

/// Consumer group ids follow the same rules as topic names.
pub fn validate_group_id(group_id: &str) -> Result<(), ConfigError> {
    validate_name("consumer group", group_id)
}

fn validate_name(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty { name });
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ConfigError::TooLong {
            name,
            max: MAX_NAME_LEN,
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ConfigError::InvalidCharacters {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBrokerAddress(s.to_string());

        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (s, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == ':' || c == '/') {
            return Err(invalid());
        }

        Ok(BrokerAddress {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses a comma-separated `host[:port]` list. At least one address is required.
pub fn parse_broker_list(raw: &str) -> Result<Vec<BrokerAddress>, ConfigError> {
    let addresses = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<BrokerAddress>, _>>()?;

    if addresses.is_empty() {
        return Err(ConfigError::Empty {
            name: "broker address list",
        });
    }
    Ok(addresses)
}

pub fn format_broker_list(addresses: &[BrokerAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn validate_database_url(url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::Empty {
            name: "database URL",
        });
    }
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        return Err(ConfigError::Invalid {
            name: "database URL",
            reason: "expected a postgres:// or postgresql:// connection string".to_string(),
        });
    }
    Ok(())
}

/// Strips credentials from a connection string so it can be logged.
pub fn redact_url(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{}://***@{}", scheme, host),
        _ => url.to_string(),
    }
}
