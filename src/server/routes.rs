use crate::error::{Error, PublishError, Result};
use crate::metrics;
use crate::relay::{handle_health, EventLog, PublishHandler, SubscriptionRegistry};
use crate::server::shutdown::shutdown_receiver;
use crate::types::SubscriptionBinding;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    publisher: Arc<PublishHandler>,
    registry: Arc<SubscriptionRegistry>,
    log: Arc<dyn EventLog>,
}

impl AppState {
    /// Create the handler state.
    pub fn new(
        publisher: Arc<PublishHandler>,
        registry: Arc<SubscriptionRegistry>,
        log: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            publisher,
            registry,
            log,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail information.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// HTTP status code.
    pub code: u16,
    /// Error message.
    pub message: String,
    /// Error status string.
    pub status: String,
}

impl ErrorResponse {
    fn new(code: StatusCode, message: impl Into<String>) -> Self {
        let status = match code {
            StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::INTERNAL_SERVER_ERROR => "INTERNAL",
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => "UNAVAILABLE",
            StatusCode::FORBIDDEN => "PERMISSION_DENIED",
            _ => "UNKNOWN",
        };

        Self {
            error: ErrorDetail {
                code: code.as_u16(),
                message: message.into(),
                status: status.to_string(),
            },
        }
    }
}

impl From<PublishError> for ErrorResponse {
    fn from(err: PublishError) -> Self {
        let code = match &err {
            PublishError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            PublishError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PublishError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            PublishError::Rejected { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| !s.is_success())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        };
        Self::new(code, err.to_string())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Acknowledgement returned to the sidecar for a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    /// Processed; do not redeliver.
    Success,
    /// Failed transiently; redeliver.
    Retry,
    /// Failed permanently; discard.
    Drop,
}

/// Body of a delivery acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryResponse {
    /// Outcome for the sidecar.
    pub status: DeliveryStatus,
}

/// Create the relay router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/publish", post(publish))
        .route("/health", get(health).post(health))
        .route("/api/HealthCheck", get(health).post(health))
        .route("/dapr/subscribe", get(list_subscriptions))
        .route("/topics/{topic}", post(deliver))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `bind_address` and serve until shutdown.
pub async fn start_server(
    bind_address: &str,
    state: AppState,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    info!("Relay HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_receiver(shutdown))
        .await?;

    info!("Relay HTTP server shut down gracefully");
    Ok(())
}

async fn publish(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<StatusCode, ErrorResponse> {
    debug!(
        "POST /publish, {} bytes for topic {}",
        body.len(),
        state.publisher.topic()
    );

    state.publisher.handle_publish(&body).await?;
    Ok(StatusCode::OK)
}

async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    (StatusCode::OK, handle_health(state.log.as_ref()))
}

async fn list_subscriptions(State(state): State<AppState>) -> Json<Vec<SubscriptionBinding>> {
    Json(state.registry.subscriptions())
}

async fn deliver(
    Path(topic): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let status = match state.registry.dispatch(&topic, &body).await {
        Ok(()) => DeliveryStatus::Success,
        Err(Error::SubscriptionNotFound(topic)) => {
            warn!("Delivery for unsubscribed topic {}", topic);
            return ErrorResponse::new(
                StatusCode::NOT_FOUND,
                format!("No subscription for topic: {}", topic),
            )
            .into_response();
        }
        Err(e) if e.is_retryable() => {
            warn!("Message on topic {} failed, requesting redelivery: {}", topic, e);
            DeliveryStatus::Retry
        }
        Err(e) => {
            warn!("Message on topic {} dropped: {}", topic, e);
            DeliveryStatus::Drop
        }
    };

    let code = match status {
        DeliveryStatus::Retry => StatusCode::INTERNAL_SERVER_ERROR,
        DeliveryStatus::Success | DeliveryStatus::Drop => StatusCode::OK,
    };
    (code, Json(DeliveryResponse { status })).into_response()
}

async fn metrics_handler() -> Response {
    match metrics::get_metrics().gather() {
        Ok(output) => (StatusCode::OK, output).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics").into_response()
        }
    }
}
