//! Broker connection settings.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{EventBusError, Result};

/// Broker address used when `KAFKA_BOOTSTRAP_SERVERS` is unset.
pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "kafka:9092";

const ENV_PREFIX: &str = "KAFKA";

/// Kafka client configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KafkaConfig {
    /// Comma-separated broker list
    pub bootstrap_servers: String,
    /// Client identifier reported to the broker
    pub client_id: String,
    /// Delivery timeout for a single publish
    pub message_timeout_ms: u64,
    /// Upper bound on one poll before it reports a timeout
    pub poll_timeout_ms: u64,
    /// Metadata fetch timeout used when a client is constructed
    pub connect_timeout_ms: u64,
    /// Consumer group session timeout
    pub session_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_string(),
            client_id: "greeter-relay".to_string(),
            message_timeout_ms: 5_000,
            poll_timeout_ms: 1_000,
            connect_timeout_ms: 5_000,
            session_timeout_ms: 30_000,
        }
    }
}

impl KafkaConfig {
    /// Load from `KAFKA_*` environment variables, falling back to defaults.
    ///
    /// - `KAFKA_BOOTSTRAP_SERVERS` (default `kafka:9092`)
    /// - `KAFKA_CLIENT_ID` (default `greeter-relay`)
    /// - `KAFKA_MESSAGE_TIMEOUT_MS`, `KAFKA_POLL_TIMEOUT_MS`,
    ///   `KAFKA_CONNECT_TIMEOUT_MS`, `KAFKA_SESSION_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(Some(vars)),
        )
    }

    fn load(environment: Environment) -> Result<Self> {
        let defaults = Self::default();

        let config: Self = Config::builder()
            .set_default("bootstrap_servers", defaults.bootstrap_servers)?
            .set_default("client_id", defaults.client_id)?
            .set_default("message_timeout_ms", defaults.message_timeout_ms)?
            .set_default("poll_timeout_ms", defaults.poll_timeout_ms)?
            .set_default("connect_timeout_ms", defaults.connect_timeout_ms)?
            .set_default("session_timeout_ms", defaults.session_timeout_ms)?
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(EventBusError::Config(
                "KAFKA_BOOTSTRAP_SERVERS must not be empty".to_string(),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(EventBusError::Config(
                "KAFKA_POLL_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = KafkaConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config, KafkaConfig::default());
        assert_eq!(config.bootstrap_servers, "kafka:9092");
    }

    #[test]
    fn bootstrap_servers_come_from_the_environment() {
        let config = KafkaConfig::from_vars(vars(&[
            ("KAFKA_BOOTSTRAP_SERVERS", "broker-1:9092,broker-2:9092"),
            ("KAFKA_POLL_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.bootstrap_servers, "broker-1:9092,broker-2:9092");
        assert_eq!(config.poll_timeout(), Duration::from_millis(250));
        assert_eq!(config.client_id, "greeter-relay");
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let config = KafkaConfig::from_vars(vars(&[("DATABASE_URL", "postgres://x")])).unwrap();
        assert_eq!(config.bootstrap_servers, DEFAULT_BOOTSTRAP_SERVERS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = KafkaConfig::from_vars(vars(&[("KAFKA_POLL_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, EventBusError::Config(_)));

        let err = KafkaConfig::from_vars(vars(&[("KAFKA_POLL_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(err.to_string().contains("KAFKA_POLL_TIMEOUT_MS"));

        let err = KafkaConfig::from_vars(vars(&[("KAFKA_BOOTSTRAP_SERVERS", "  ")])).unwrap_err();
        assert!(err.is_fatal());
    }
}
