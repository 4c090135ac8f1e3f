//! Broker client abstraction and implementations.
//!
//! Handlers never talk to a broker directly; they receive an
//! `Arc<dyn BrokerClient>` acquired once at start-up.

use crate::error::PublishError;
use crate::types::MessageEvent;
use async_trait::async_trait;

pub mod memory;
pub mod sidecar;

/// Publish side of a message broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish `event` to `topic` on the pub/sub component `bus_name`.
    async fn publish(
        &self,
        bus_name: &str,
        topic: &str,
        event: &MessageEvent,
    ) -> Result<(), PublishError>;

    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Release the client at shutdown, finishing any in-flight work.
    async fn close(&self) {}
}
