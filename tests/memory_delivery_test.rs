//! Integration tests for publish-to-subscriber delivery through the in-memory broker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use topic_relay::broker::memory::{InMemoryBroker, RetryPolicy};
use topic_relay::broker::BrokerClient;
use topic_relay::config::RelayConfig;
use topic_relay::error::{DecodeError, ProcessingError};
use topic_relay::relay::{
    MemoryLog, MessageHandler, PublishHandler, SubscriptionRegistry, TopicMessageLogger,
};
use topic_relay::server::{serve, AppState};
use topic_relay::types::MessageEvent;

/// Fails the first `failures` deliveries with the given error kind.
struct Flaky {
    attempts: AtomicU32,
    failures: u32,
    decode: bool,
}

impl Flaky {
    fn new(failures: u32, decode: bool) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            failures,
            decode,
        }
    }
}

#[async_trait]
impl MessageHandler for Flaky {
    async fn handle_message(&self, _payload: &[u8]) -> topic_relay::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.failures {
            return Ok(());
        }
        if self.decode {
            Err(DecodeError::InvalidEnvelope("not an order".to_string()).into())
        } else {
            Err(ProcessingError::Failed(format!("attempt {}", attempt)).into())
        }
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        min_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        max_attempts,
    }
}

fn broker_for(handler: Arc<dyn MessageHandler>, max_attempts: u32) -> InMemoryBroker {
    let mut registry = SubscriptionRegistry::new();
    registry.register("messagebus", "a", handler).unwrap();
    InMemoryBroker::with_registry(Arc::new(registry))
        .with_retry_policy(fast_policy(max_attempts))
        .with_recording()
}

#[tokio::test]
async fn test_publish_is_delivered_to_subscriber_over_http() {
    let config = RelayConfig::default();
    let log = Arc::new(MemoryLog::new());

    let mut registry = SubscriptionRegistry::new();
    registry
        .register(
            &config.pubsub.subscribe_bus,
            &config.pubsub.topic,
            Arc::new(TopicMessageLogger::new(log.clone())),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let broker = Arc::new(InMemoryBroker::with_registry(registry.clone()));
    let publisher = Arc::new(PublishHandler::new(broker.clone(), log.clone(), &config.pubsub));
    let state = AppState::new(publisher, registry, log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server = tokio::spawn(async move { serve(listener, state, shutdown_rx).await });

    let response = reqwest::Client::new()
        .post(format!("http://{}/publish", addr))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    broker.flush().await;

    assert!(log.contains("Published MessageEvent Type: OrderCreated hello to Topic: a"));
    assert!(log.contains("Topic received a message: hello (type: OrderCreated)."));

    let _ = shutdown_tx.send(());
    let result = tokio::time::timeout(Duration::from_secs(2), server).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}

#[tokio::test]
async fn test_processing_failures_are_redelivered() {
    let handler = Arc::new(Flaky::new(2, false));
    let broker = broker_for(handler.clone(), 5);

    broker
        .publish("messagebus", "a", &MessageEvent::new("OrderCreated", "x"))
        .await
        .unwrap();
    broker.flush().await;

    assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_redelivery_stops_at_max_attempts() {
    let handler = Arc::new(Flaky::new(u32::MAX, false));
    let broker = broker_for(handler.clone(), 3);

    broker
        .publish("messagebus", "a", &MessageEvent::new("OrderCreated", "x"))
        .await
        .unwrap();
    broker.flush().await;

    assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_decode_failures_are_not_redelivered() {
    let handler = Arc::new(Flaky::new(u32::MAX, true));
    let broker = broker_for(handler.clone(), 5);

    broker
        .publish("messagebus", "a", &MessageEvent::new("OrderCreated", "x"))
        .await
        .unwrap();
    broker.flush().await;

    assert_eq!(handler.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_other_bus_is_recorded_but_not_delivered() {
    let handler = Arc::new(Flaky::new(0, false));
    let broker = broker_for(handler.clone(), 5);

    broker
        .publish("otherbus", "a", &MessageEvent::new("OrderCreated", "x"))
        .await
        .unwrap();
    broker.flush().await;

    assert_eq!(handler.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(broker.published_events().await.len(), 1);
}
