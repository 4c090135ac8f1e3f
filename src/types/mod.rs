//! Common data types for topic-relay.

use crate::error::DecodeError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event envelope published for every inbound `POST /publish` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    message_type: String,
    message: String,
}

impl MessageEvent {
    /// Create a new envelope.
    pub fn new(message_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            message: message.into(),
        }
    }

    /// Message type.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Message payload.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Binding of a topic on a pub/sub component to a delivery route.
///
/// Serialized in the shape the sidecar expects from `GET /dapr/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBinding {
    /// Pub/sub component name.
    #[serde(rename = "pubsubname")]
    pub bus_name: String,
    /// Topic name.
    pub topic: String,
    /// HTTP route the runtime delivers messages to.
    pub route: String,
}

impl SubscriptionBinding {
    /// Bind `topic` on `bus_name`, delivered to `/topics/{topic}`.
    pub fn new(bus_name: impl Into<String>, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            bus_name: bus_name.into(),
            route: format!("/topics/{}", topic),
            topic,
        }
    }
}

/// CloudEvents spec version used when wrapping events.
pub const CLOUD_EVENT_SPEC_VERSION: &str = "1.0";

/// Wrap event data in a CloudEvent, the way the sidecar does before delivery.
pub fn wrap_cloud_event(bus_name: &str, topic: &str, data: Value) -> Value {
    serde_json::json!({
        "specversion": CLOUD_EVENT_SPEC_VERSION,
        "id": Uuid::new_v4().to_string(),
        "source": "topic-relay",
        "type": "com.dapr.event.sent",
        "datacontenttype": "application/json",
        "pubsubname": bus_name,
        "topic": topic,
        "time": Utc::now().to_rfc3339(),
        "data": data,
    })
}

/// Extract the data carried by a delivered body.
///
/// CloudEvents are unwrapped: string data is returned verbatim, any other JSON
/// value is re-serialized. Bodies that are not CloudEvents are returned as-is.
pub fn unwrap_cloud_event(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let Ok(Value::Object(mut event)) = serde_json::from_slice::<Value>(body) else {
        return Ok(body.to_vec());
    };

    if !event.contains_key("specversion") {
        return Ok(body.to_vec());
    }

    match event.remove("data") {
        Some(Value::String(text)) => Ok(text.into_bytes()),
        Some(Value::Null) | None => {
            if let Some(Value::String(encoded)) = event.get("data_base64") {
                return Err(DecodeError::InvalidEnvelope(format!(
                    "binary data_base64 payloads are not supported ({} bytes)",
                    encoded.len()
                )));
            }
            Ok(Vec::new())
        }
        Some(other) => serde_json::to_vec(&other)
            .map_err(|e| DecodeError::InvalidEnvelope(e.to_string())),
    }
}
