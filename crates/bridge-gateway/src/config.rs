//! Gateway configuration.
//!
//! Read once at startup from a TOML file; not hot-reloadable. Every field
//! has a default so a missing file yields a working local-broker setup.

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::error::GatewayError;

/// MQTT broker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker hostname or address
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// Optional username
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// MQTT client identifier
    pub client_id: String,
    /// Keep-alive interval, seconds
    pub keep_alive_s: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "esp-sensor-hub-bridge".to_string(),
            keep_alive_s: 15,
        }
    }
}

/// Broker topic layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Per-device topic prefix (`<prefix>/<HEX>/readings` etc.)
    pub prefix: String,
    /// Inbound command topic
    pub command: String,
    /// Outbound command acknowledgement topic
    pub command_ack: String,
    /// Retained gateway online/offline status topic
    pub gateway_status: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            prefix: "esp-sensor-hub".to_string(),
            command: "lora/command".to_string(),
            command_ack: "lora/command/ack".to_string(),
            gateway_status: "esp-sensor-hub/gateway/status".to_string(),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Broker connection
    pub broker: BrokerConfig,
    /// Topic layout
    pub topics: TopicsConfig,
    /// Gateway identity used in the status message
    pub gateway_id: String,
    /// Device registry capacity
    pub registry_capacity: usize,
    /// Per-device dedup ring size
    pub dedup_ring_size: usize,
    /// Command queue capacity
    pub command_queue_capacity: usize,
    /// Command expiration window, seconds
    pub command_expiration_s: u64,
    /// Decoded-record queue capacity
    pub record_queue_capacity: usize,
    /// Path of the registry persistence document
    pub store_path: String,
    /// Optional persistence sidecar base URL
    pub sidecar_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            topics: TopicsConfig::default(),
            gateway_id: "lora-bridge".to_string(),
            registry_capacity: 10,
            dedup_ring_size: 50,
            command_queue_capacity: 10,
            command_expiration_s: 300,
            record_queue_capacity: 32,
            store_path: "devices.json".to_string(),
            sidecar_url: None,
        }
    }
}

impl GatewayConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| GatewayError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Command expiration window as a duration.
    #[must_use]
    pub fn command_expiration(&self) -> Duration {
        Duration::from_secs(self.command_expiration_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_contract() {
        let config = GatewayConfig::default();
        assert_eq!(config.topics.prefix, "esp-sensor-hub");
        assert_eq!(config.topics.command, "lora/command");
        assert_eq!(config.registry_capacity, 10);
        assert_eq!(config.dedup_ring_size, 50);
        assert_eq!(config.command_queue_capacity, 10);
        assert_eq!(config.command_expiration(), Duration::from_secs(300));
        assert_eq!(config.broker.keep_alive_s, 15);
        assert!(config.sidecar_url.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            registry_capacity = 20

            [broker]
            host = "mqtt.example"
            port = 8883
            "#,
        )
        .unwrap();
        assert_eq!(config.broker.host, "mqtt.example");
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.registry_capacity, 20);
        assert_eq!(config.dedup_ring_size, 50);
        assert_eq!(config.topics.command, "lora/command");
    }
}
