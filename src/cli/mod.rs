//! CLI module for topic-relay
/// Command execution handlers
pub mod commands;
/// Output formatting utilities
pub mod output;

use crate::config::{
    BrokerKind, LogFormat, RelayConfig, DEFAULT_BUS_NAME, DEFAULT_MESSAGE_TYPE, DEFAULT_TOPIC,
};
use clap::{Args, Parser, Subcommand};

/// Command-line interface for topic-relay
#[derive(Parser)]
#[command(name = "topic-relay")]
#[command(author, version, about = "HTTP publish relay and topic subscriber for a sidecar pub/sub broker", long_about = None)]
pub struct Cli {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "RELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text | json)
    #[arg(long, global = true, env = "RELAY_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve(ServeArgs),

    /// Publish a message through a running relay
    Publish {
        /// Message body
        message: String,

        /// Relay base URL
        #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8080")]
        relay_url: String,
    },

    /// Health check a running relay
    Health {
        /// Relay base URL
        #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8080")]
        relay_url: String,
    },

    /// List the subscriptions a running relay advertises
    Subscriptions {
        /// Relay base URL
        #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8080")]
        relay_url: String,
    },

    /// Show the configuration `serve` would run with
    Config(ServeArgs),
}

/// Server settings shared by `serve` and `config`
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Bind address (use 0.0.0.0 for all interfaces)
    #[arg(long, env = "RELAY_BIND_ADDRESS", default_value = "127.0.0.1")]
    pub bind_address: String,

    /// HTTP port
    #[arg(long, env = "RELAY_PORT", default_value = "8080")]
    pub port: u16,

    /// Pub/sub component `POST /publish` sends to
    #[arg(long, env = "RELAY_PUBLISH_BUS", default_value = DEFAULT_BUS_NAME)]
    pub publish_bus: String,

    /// Pub/sub component the topic subscription binds to
    #[arg(long, env = "PubSubName", default_value = DEFAULT_BUS_NAME)]
    pub subscribe_bus: String,

    /// Topic to publish to and subscribe on
    #[arg(long, env = "RELAY_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Message type stamped on published events
    #[arg(long, env = "RELAY_MESSAGE_TYPE", default_value = DEFAULT_MESSAGE_TYPE)]
    pub message_type: String,

    /// Broker client (sidecar | memory)
    #[arg(long, env = "RELAY_BROKER", default_value = "sidecar")]
    pub broker: String,

    /// Sidecar host
    #[arg(long, env = "DAPR_HOST", default_value = "127.0.0.1")]
    pub sidecar_host: String,

    /// Sidecar HTTP port
    #[arg(long, env = "DAPR_HTTP_PORT", default_value = "3500")]
    pub sidecar_port: u16,

    /// Sidecar request timeout in seconds
    #[arg(long, env = "RELAY_BROKER_TIMEOUT", default_value = "30")]
    pub broker_timeout: u64,
}

impl ServeArgs {
    /// Build a validated configuration from the arguments.
    pub fn into_config(self, log_level: &str, log_format: &str) -> crate::Result<RelayConfig> {
        let mut config = RelayConfig::default();

        config.server.bind_address = self.bind_address;
        config.server.port = self.port;
        config.pubsub.publish_bus = self.publish_bus;
        config.pubsub.subscribe_bus = self.subscribe_bus;
        config.pubsub.topic = self.topic;
        config.pubsub.message_type = self.message_type;
        config.broker.kind = BrokerKind::parse(&self.broker)?;
        config.broker.sidecar_host = self.sidecar_host;
        config.broker.sidecar_http_port = self.sidecar_port;
        config.broker.timeout_seconds = self.broker_timeout;
        config.logging.level = log_level.to_string();
        config.logging.format = LogFormat::parse(log_format);

        config.validate()?;
        Ok(config)
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
