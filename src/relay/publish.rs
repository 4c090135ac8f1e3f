//! Publish handler: wraps an inbound body in a [`MessageEvent`] and forwards it.

use crate::broker::BrokerClient;
use crate::config::PubsubConfig;
use crate::error::PublishError;
use crate::metrics;
use crate::relay::log::EventLog;
use crate::types::MessageEvent;
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

/// Forwards request bodies to a fixed bus and topic.
///
/// Exactly one broker publish per call and no retries: a failed publish is
/// returned to the caller as-is.
pub struct PublishHandler {
    broker: Arc<dyn BrokerClient>,
    log: Arc<dyn EventLog>,
    bus_name: String,
    topic: String,
    message_type: String,
}

impl PublishHandler {
    /// Create a handler publishing to the bus and topic in `config`.
    pub fn new(broker: Arc<dyn BrokerClient>, log: Arc<dyn EventLog>, config: &PubsubConfig) -> Self {
        Self {
            broker,
            log,
            bus_name: config.publish_bus.clone(),
            topic: config.topic.clone(),
            message_type: config.message_type.clone(),
        }
    }

    /// Topic events are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `raw_body` as a new event.
    pub async fn handle_publish(&self, raw_body: &[u8]) -> Result<(), PublishError> {
        let body = std::str::from_utf8(raw_body)?;
        let event = MessageEvent::new(self.message_type.as_str(), body);

        let metrics = metrics::get_metrics();
        let started = Instant::now();
        let result = self.broker.publish(&self.bus_name, &self.topic, &event).await;
        metrics
            .publish_latency_seconds
            .with_label_values(&[self.topic.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics
                    .messages_published_total
                    .with_label_values(&[self.topic.as_str(), "ok"])
                    .inc();
                self.log.log(
                    Level::INFO,
                    &format!(
                        "Published MessageEvent Type: {} {} to Topic: {}",
                        event.message_type(),
                        event.message(),
                        self.topic
                    ),
                );
                Ok(())
            }
            Err(e) => {
                metrics
                    .messages_published_total
                    .with_label_values(&[self.topic.as_str(), "error"])
                    .inc();
                self.log.log(
                    Level::ERROR,
                    &format!(
                        "Failed to publish to {}/{} via {}: {}",
                        self.bus_name,
                        self.topic,
                        self.broker.name(),
                        e
                    ),
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::InMemoryBroker;
    use crate::config::RelayConfig;
    use crate::relay::log::MemoryLog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Broker that always fails and counts calls.
    struct FailingBroker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BrokerClient for FailingBroker {
        async fn publish(&self, _: &str, _: &str, _: &MessageEvent) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PublishError::Rejected {
                status: 503,
                body: "sidecar not ready".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn handler_with(broker: Arc<dyn BrokerClient>, log: Arc<MemoryLog>) -> PublishHandler {
        PublishHandler::new(broker, log, &RelayConfig::default().pubsub)
    }

    #[tokio::test]
    async fn test_publish_wraps_body_in_event() {
        let broker = Arc::new(InMemoryBroker::new().with_recording());
        let log = Arc::new(MemoryLog::new());
        let handler = handler_with(broker.clone(), log.clone());

        handler.handle_publish(b"order #42").await.unwrap();

        let published = broker.published_events().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].bus_name, "messagebus");
        assert_eq!(published[0].topic, "a");
        assert_eq!(published[0].event.message_type(), "OrderCreated");
        assert_eq!(published[0].event.message(), "order #42");
        assert!(log.contains("Published MessageEvent Type: OrderCreated order #42 to Topic: a"));
    }

    #[tokio::test]
    async fn test_publish_accepts_empty_body() {
        let broker = Arc::new(InMemoryBroker::new().with_recording());
        let handler = handler_with(broker.clone(), Arc::new(MemoryLog::new()));

        handler.handle_publish(b"").await.unwrap();

        assert_eq!(broker.published_events().await[0].event.message(), "");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected_before_publish() {
        let broker = Arc::new(InMemoryBroker::new().with_recording());
        let handler = handler_with(broker.clone(), Arc::new(MemoryLog::new()));

        let err = handler.handle_publish(&[0xc3, 0x28]).await.unwrap_err();

        assert!(matches!(err, PublishError::InvalidBody(_)));
        assert!(broker.published_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_broker_failure_propagates_without_retry() {
        let broker = Arc::new(FailingBroker {
            calls: AtomicUsize::new(0),
        });
        let log = Arc::new(MemoryLog::new());
        let handler = handler_with(broker.clone(), log.clone());

        let err = handler.handle_publish(b"hello").await.unwrap_err();

        assert!(matches!(err, PublishError::Rejected { status: 503, .. }));
        assert_eq!(broker.calls.load(Ordering::SeqCst), 1);
        assert!(log.contains("Failed to publish to messagebus/a via failing"));
    }

    #[tokio::test]
    async fn test_concurrent_publishes_are_independent() {
        let broker = Arc::new(InMemoryBroker::new().with_recording());
        let handler = Arc::new(handler_with(broker.clone(), Arc::new(MemoryLog::new())));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.handle_publish(format!("body-{}", i).as_bytes()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut messages: Vec<String> = broker
            .published_events()
            .await
            .into_iter()
            .map(|p| p.event.message().to_string())
            .collect();
        messages.sort();

        let mut expected: Vec<String> = (0..16).map(|i| format!("body-{}", i)).collect();
        expected.sort();
        assert_eq!(messages, expected);
    }
}
