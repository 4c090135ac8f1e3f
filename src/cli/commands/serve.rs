// Serve command implementation
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::broker::memory::InMemoryBroker;
use crate::broker::sidecar::SidecarClient;
use crate::broker::BrokerClient;
use crate::config::{BrokerKind, RelayConfig};
use crate::relay::{EventLog, PublishHandler, SubscriptionRegistry, TopicMessageLogger, TracingLog};
use crate::server::shutdown::ShutdownSignal;
use crate::server::{start_server, AppState};

/// Build the subscription table: the configured topic bound to the message logger.
pub fn build_registry(config: &RelayConfig, log: Arc<dyn EventLog>) -> Result<SubscriptionRegistry> {
    let mut registry = SubscriptionRegistry::new();
    registry
        .register(
            &config.pubsub.subscribe_bus,
            &config.pubsub.topic,
            Arc::new(TopicMessageLogger::new(log)),
        )
        .context("Failed to register topic subscription")?;
    Ok(registry)
}

/// Create the broker client selected in `config`.
pub fn build_broker(
    config: &RelayConfig,
    registry: Arc<SubscriptionRegistry>,
) -> Result<Arc<dyn BrokerClient>> {
    let broker: Arc<dyn BrokerClient> = match config.broker.kind {
        BrokerKind::Sidecar => {
            let client = SidecarClient::new(config.sidecar_url(), config.broker_timeout())
                .context("Failed to create sidecar client")?;
            info!("Publishing through sidecar at {}", config.sidecar_url());
            Arc::new(client)
        }
        BrokerKind::Memory => {
            info!("Publishing to in-memory broker");
            Arc::new(InMemoryBroker::with_registry(registry))
        }
    };
    Ok(broker)
}

/// Execute the serve command - runs the relay until SIGINT/SIGTERM
pub async fn execute(config: RelayConfig) -> Result<()> {
    info!("Starting topic-relay");
    info!(
        publish_bus = %config.pubsub.publish_bus,
        subscribe_bus = %config.pubsub.subscribe_bus,
        topic = %config.pubsub.topic,
        "Configuration loaded successfully"
    );

    let log: Arc<dyn EventLog> = Arc::new(TracingLog);
    let registry = Arc::new(build_registry(&config, log.clone())?);
    let broker = build_broker(&config, registry.clone())?;

    let publisher = Arc::new(PublishHandler::new(broker.clone(), log.clone(), &config.pubsub));
    let state = AppState::new(publisher, registry, log);

    let shutdown = ShutdownSignal::new();
    let signal_handle = shutdown.trigger_on_signal();

    let result = start_server(&config.listen_address(), state, shutdown.subscribe())
        .await
        .context("Relay HTTP server failed");

    signal_handle.abort();

    info!("Closing {} broker client", broker.name());
    broker.close().await;

    result
}
