//! Sidecar HTTP publish client.

use super::BrokerClient;
use crate::error::PublishError;
use crate::types::MessageEvent;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Publishes through the sidecar's `/v1.0/publish/{bus}/{topic}` endpoint.
///
/// Holds one `reqwest::Client` for the life of the process; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct SidecarClient {
    client: Client,
    base_url: String,
}

impl SidecarClient {
    /// Create a client for the sidecar listening at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("topic-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn publish_url(&self, bus_name: &str, topic: &str) -> String {
        format!("{}/v1.0/publish/{}/{}", self.base_url, bus_name, topic)
    }
}

#[async_trait]
impl BrokerClient for SidecarClient {
    async fn publish(
        &self,
        bus_name: &str,
        topic: &str,
        event: &MessageEvent,
    ) -> Result<(), PublishError> {
        let url = self.publish_url(bus_name, topic);
        let body = serde_json::to_vec(event)?;

        debug!(url = %url, bytes = body.len(), "Publishing through sidecar");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(format!("sidecar request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}
