use std::collections::BTreeMap;

use rdkafka::config::ClientConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broker address used when nothing else is configured.
pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "localhost:9093";

/// Environment variable overriding the bootstrap servers.
pub const BOOTSTRAP_SERVERS_ENV: &str = "KAFKA_BOOTSTRAP_SERVERS";

fn bootstrap_servers_from_env() -> String {
    std::env::var(BOOTSTRAP_SERVERS_ENV).unwrap_or_else(|_| DEFAULT_BOOTSTRAP_SERVERS.to_string())
}

/// A fresh consumer group id, so consecutive test runs never share offsets.
#[must_use]
pub fn generate_group_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("tessera-{}", &id[..8])
}

/// Kafka consumer configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConsumerConfig {
    /// Comma separated broker list
    pub bootstrap_servers: String,

    /// Consumer group id. A fresh one is generated per consumer when unset.
    pub group_id: Option<String>,

    /// Maximum time between polls before the consumer leaves the group
    pub max_poll_interval_ms: u64,

    /// Raw librdkafka properties applied last
    pub overrides: BTreeMap<String, String>,
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_string(),
            group_id: None,
            max_poll_interval_ms: 86_400_000,
            overrides: BTreeMap::new(),
        }
    }
}

impl KafkaConsumerConfig {
    /// Default configuration with bootstrap servers taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bootstrap_servers: bootstrap_servers_from_env(),
            ..Self::default()
        }
    }

    /// Sets the bootstrap servers.
    #[must_use]
    pub fn with_bootstrap_servers(mut self, servers: impl Into<String>) -> Self {
        self.bootstrap_servers = servers.into();
        self
    }

    /// Sets a fixed consumer group id.
    #[must_use]
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Sets a raw librdkafka property.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Builds the librdkafka client configuration.
    ///
    /// Offsets reset to `latest` and are never committed, and end-of-partition
    /// events are enabled because the assignment handshake relies on them.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let group_id = self.group_id.clone().unwrap_or_else(generate_group_id);

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "true")
            .set("max.poll.interval.ms", self.max_poll_interval_ms.to_string());

        for (key, value) in &self.overrides {
            config.set(key, value);
        }

        config
    }
}

/// Kafka producer configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaProducerConfig {
    /// Comma separated broker list
    pub bootstrap_servers: String,

    /// Raw librdkafka properties applied last
    pub overrides: BTreeMap<String, String>,
}

impl Default for KafkaProducerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

impl KafkaProducerConfig {
    /// Default configuration with bootstrap servers taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bootstrap_servers: bootstrap_servers_from_env(),
            ..Self::default()
        }
    }

    /// Sets the bootstrap servers.
    #[must_use]
    pub fn with_bootstrap_servers(mut self, servers: impl Into<String>) -> Self {
        self.bootstrap_servers = servers.into();
        self
    }

    /// Sets a raw librdkafka property.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Builds the librdkafka client configuration.
    ///
    /// Records are sent without batching delay and acknowledged by all
    /// in-sync replicas.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("queue.buffering.max.ms", "0")
            .set("acks", "all");

        for (key, value) in &self.overrides {
            config.set(key, value);
        }

        config
    }
}
