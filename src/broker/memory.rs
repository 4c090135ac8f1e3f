//! In-process broker.
//!
//! Optionally records published events and, when attached to a
//! [`SubscriptionRegistry`], delivers them to the handler bound to the topic the
//! same way the sidecar would: wrapped in a CloudEvent, redelivered with
//! exponential backoff while the handler reports a retryable failure.

use super::BrokerClient;
use crate::error::PublishError;
use crate::relay::subscriber::SubscriptionRegistry;
use crate::types::{wrap_cloud_event, MessageEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Redelivery policy for in-process delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first redelivery.
    pub min_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failed_attempts` failures, or
    /// `None` once the attempt budget is spent.
    pub fn delay_after(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }

        // min * 2^(failed - 1), capped at max
        let factor = 2_u32.saturating_pow(failed_attempts - 1);
        Some(self.min_backoff.saturating_mul(factor).min(self.max_backoff))
    }
}

/// An event accepted by the in-process broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    /// Pub/sub component name.
    pub bus_name: String,
    /// Topic name.
    pub topic: String,
    /// The published envelope.
    pub event: MessageEvent,
}

/// In-process broker.
pub struct InMemoryBroker {
    published: Mutex<Vec<PublishedEvent>>,
    deliveries: Mutex<Vec<JoinHandle<()>>>,
    registry: Option<Arc<SubscriptionRegistry>>,
    retry_policy: RetryPolicy,
    available: AtomicBool,
    recording: bool,
}

impl InMemoryBroker {
    /// Create a broker that accepts events without delivering them.
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            deliveries: Mutex::new(Vec::new()),
            registry: None,
            retry_policy: RetryPolicy::default(),
            available: AtomicBool::new(true),
            recording: false,
        }
    }

    /// Create a broker that also delivers to the handlers in `registry`.
    pub fn with_registry(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::new()
        }
    }

    /// Override the redelivery policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Keep every accepted event for [`published_events`](Self::published_events).
    ///
    /// The log is unbounded; leave it off for long-running brokers.
    pub fn with_recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Simulate the broker going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Snapshot of every event accepted so far, in acceptance order.
    ///
    /// Always empty unless the broker was built [`with_recording`](Self::with_recording).
    pub async fn published_events(&self) -> Vec<PublishedEvent> {
        self.published.lock().await.clone()
    }

    /// Wait until all in-flight deliveries have finished.
    pub async fn flush(&self) {
        let handles: Vec<_> = self.deliveries.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Delivery task failed: {}", e);
            }
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn publish(
        &self,
        bus_name: &str,
        topic: &str,
        event: &MessageEvent,
    ) -> Result<(), PublishError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable(
                "in-memory broker is unavailable".to_string(),
            ));
        }

        let data = serde_json::to_value(event)?;

        if self.recording {
            self.published.lock().await.push(PublishedEvent {
                bus_name: bus_name.to_string(),
                topic: topic.to_string(),
                event: event.clone(),
            });
        }

        let Some(registry) = &self.registry else {
            return Ok(());
        };

        if !registry.is_bound(bus_name, topic) {
            debug!("No subscriber for {}/{}, event recorded only", bus_name, topic);
            return Ok(());
        }

        let body = serde_json::to_vec(&wrap_cloud_event(bus_name, topic, data))?;

        // Hold the lock across spawn so a concurrent flush() cannot miss this task
        let mut deliveries = self.deliveries.lock().await;
        deliveries.retain(|h| !h.is_finished());
        deliveries.push(tokio::spawn(deliver(
            registry.clone(),
            topic.to_string(),
            body,
            self.retry_policy.clone(),
        )));

        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) {
        self.flush().await;
    }
}

/// Deliver one message, redelivering retryable failures per `policy`.
async fn deliver(
    registry: Arc<SubscriptionRegistry>,
    topic: String,
    body: Vec<u8>,
    policy: RetryPolicy,
) {
    let mut failed_attempts = 0;

    loop {
        let err = match registry.dispatch(&topic, &body).await {
            Ok(()) => {
                if failed_attempts > 0 {
                    info!(
                        "Delivered message on topic {} after {} redeliveries",
                        topic, failed_attempts
                    );
                }
                return;
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            warn!("Dropping message on topic {}: {}", topic, err);
            return;
        }

        failed_attempts += 1;
        match policy.delay_after(failed_attempts) {
            Some(delay) => {
                warn!(
                    "Delivery on topic {} failed (attempt {}), retrying in {:?}: {}",
                    topic, failed_attempts, delay, err
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                error!(
                    "Max delivery attempts exceeded on topic {}, dropping message: {}",
                    topic, err
                );
                return;
            }
        }
    }
}
