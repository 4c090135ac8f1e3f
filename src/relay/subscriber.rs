//! Topic subscriptions and the handlers bound to them.

use crate::error::{DecodeError, Error, Result};
use crate::metrics;
use crate::relay::log::EventLog;
use crate::types::{unwrap_cloud_event, MessageEvent, SubscriptionBinding};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, Level};

/// Handler invoked for every message delivered on a subscribed topic.
///
/// `Ok` acknowledges the delivery. Errors are reported back to the delivering
/// runtime, which decides whether to redeliver (see [`Error::is_retryable`]).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one delivered payload.
    async fn handle_message(&self, payload: &[u8]) -> Result<()>;
}

/// Logs every message received on its topic.
pub struct TopicMessageLogger {
    log: Arc<dyn EventLog>,
}

impl TopicMessageLogger {
    /// Create a logger writing to `log`.
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl MessageHandler for TopicMessageLogger {
    async fn handle_message(&self, payload: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(payload).map_err(DecodeError::from)?;

        self.log
            .log(Level::INFO, "Processed a ConsumeTopicMessage request from the runtime.");

        match serde_json::from_str::<MessageEvent>(text) {
            Ok(event) => {
                debug!(message_type = event.message_type(), "Decoded message envelope");
                self.log.log(
                    Level::INFO,
                    &format!(
                        "Topic received a message: {} (type: {}).",
                        event.message(),
                        event.message_type()
                    ),
                );
            }
            Err(_) => {
                self.log
                    .log(Level::INFO, &format!("Topic received a message: {}.", text));
            }
        }

        Ok(())
    }
}

struct Subscription {
    binding: SubscriptionBinding,
    handler: Arc<dyn MessageHandler>,
}

/// Table of topic subscriptions, built once at start-up.
///
/// Each topic is bound to at most one handler; the delivery route for a topic
/// is `/topics/{topic}`.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: BTreeMap<String, Subscription>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `topic` on `bus_name`.
    pub fn register(
        &mut self,
        bus_name: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        if self.subscriptions.contains_key(topic) {
            return Err(Error::Config(format!(
                "topic '{}' already has a subscription",
                topic
            )));
        }

        self.subscriptions.insert(
            topic.to_string(),
            Subscription {
                binding: SubscriptionBinding::new(bus_name, topic),
                handler,
            },
        );
        Ok(())
    }

    /// Every registered binding, ordered by topic.
    pub fn subscriptions(&self) -> Vec<SubscriptionBinding> {
        self.subscriptions
            .values()
            .map(|s| s.binding.clone())
            .collect()
    }

    /// Whether `topic` on `bus_name` has a handler.
    pub fn is_bound(&self, bus_name: &str, topic: &str) -> bool {
        self.subscriptions
            .get(topic)
            .is_some_and(|s| s.binding.bus_name == bus_name)
    }

    /// Deliver `body` to the handler bound to `topic`.
    ///
    /// CloudEvent bodies are unwrapped before the handler sees them.
    pub async fn dispatch(&self, topic: &str, body: &[u8]) -> Result<()> {
        let subscription = self
            .subscriptions
            .get(topic)
            .ok_or_else(|| Error::SubscriptionNotFound(topic.to_string()))?;

        let result = match unwrap_cloud_event(body) {
            Ok(payload) => subscription.handler.handle_message(&payload).await,
            Err(e) => Err(e.into()),
        };

        let outcome = match &result {
            Ok(()) => "ok",
            Err(Error::Decode(_)) => "dropped",
            Err(_) => "error",
        };
        metrics::get_metrics()
            .messages_received_total
            .with_label_values(&[topic, outcome])
            .inc();

        result
    }
}
