//! Configuration system for topic-relay.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default topic both the publisher and the subscriber use.
pub const DEFAULT_TOPIC: &str = "a";

/// Default message type stamped on every published envelope.
pub const DEFAULT_MESSAGE_TYPE: &str = "OrderCreated";

/// Default pub/sub component the publisher targets.
pub const DEFAULT_BUS_NAME: &str = "messagebus";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Pub/sub configuration.
    pub pubsub: PubsubConfig,
    /// Broker client configuration.
    pub broker: BrokerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_address: String,
    /// HTTP port.
    pub port: u16,
}

/// Pub/sub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubsubConfig {
    /// Pub/sub component `POST /publish` sends to.
    pub publish_bus: String,
    /// Pub/sub component the topic subscription binds to.
    pub subscribe_bus: String,
    /// Topic name.
    pub topic: String,
    /// Message type stamped on published envelopes.
    pub message_type: String,
}

/// Broker client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Which broker client to use.
    pub kind: BrokerKind,
    /// Sidecar host.
    pub sidecar_host: String,
    /// Sidecar HTTP port.
    pub sidecar_http_port: u16,
    /// Request timeout for sidecar calls, in seconds.
    pub timeout_seconds: u64,
}

/// Broker client selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// Publish through the sidecar HTTP API.
    Sidecar,
    /// Publish to an in-process broker.
    Memory,
}

impl BrokerKind {
    /// Parse a broker kind from its CLI name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sidecar" | "dapr" => Ok(Self::Sidecar),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "unknown broker '{}' (expected sidecar | memory)",
                other
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Log format (text or json).
    pub format: LogFormat,
}

/// Log format enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format.
    Text,
    /// JSON format.
    Json,
}

impl LogFormat {
    /// Parse log format from string, falling back to text.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
            },
            pubsub: PubsubConfig {
                publish_bus: DEFAULT_BUS_NAME.to_string(),
                subscribe_bus: DEFAULT_BUS_NAME.to_string(),
                topic: DEFAULT_TOPIC.to_string(),
                message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            },
            broker: BrokerConfig {
                kind: BrokerKind::Sidecar,
                sidecar_host: "127.0.0.1".to_string(),
                sidecar_http_port: 3500,
                timeout_seconds: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Text,
            },
        }
    }
}

impl RelayConfig {
    /// Address the HTTP server binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Base URL of the sidecar HTTP API.
    pub fn sidecar_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.broker.sidecar_host, self.broker.sidecar_http_port
        )
    }

    /// Sidecar request timeout.
    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.timeout_seconds)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("pubsub.publish_bus", &self.pubsub.publish_bus),
            ("pubsub.subscribe_bus", &self.pubsub.subscribe_bus),
            ("pubsub.topic", &self.pubsub.topic),
            ("pubsub.message_type", &self.pubsub.message_type),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", field)));
            }
        }

        if self.pubsub.topic.contains('/') {
            return Err(Error::Config(format!(
                "pubsub.topic must not contain '/': {}",
                self.pubsub.topic
            )));
        }

        if self.broker.kind == BrokerKind::Sidecar {
            if self.broker.sidecar_http_port == 0 {
                return Err(Error::Config(
                    "broker.sidecar_http_port must be non-zero".to_string(),
                ));
            }
            if self.broker.timeout_seconds == 0 {
                return Err(Error::Config(
                    "broker.timeout_seconds must be non-zero".to_string(),
                ));
            }
        }

        Ok(())
    }
}
