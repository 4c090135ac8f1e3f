//! Integration tests for publishing through a sidecar.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use topic_relay::broker::sidecar::SidecarClient;
use topic_relay::broker::BrokerClient;
use topic_relay::config::RelayConfig;
use topic_relay::error::PublishError;
use topic_relay::relay::{MemoryLog, PublishHandler, SubscriptionRegistry};
use topic_relay::server::{serve, AppState};
use topic_relay::types::MessageEvent;

#[derive(Debug, Clone)]
struct CapturedPublish {
    bus: String,
    topic: String,
    content_type: Option<String>,
    body: serde_json::Value,
}

#[derive(Clone)]
struct FakeSidecar {
    published: Arc<Mutex<Vec<CapturedPublish>>>,
    status: StatusCode,
}

async fn publish_handler(
    Path((bus, topic)): Path<(String, String)>,
    State(state): State<FakeSidecar>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let captured = CapturedPublish {
        bus,
        topic,
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    };
    state.published.lock().await.push(captured);

    let body = if state.status.is_success() {
        String::new()
    } else {
        r#"{"errorCode":"ERR_PUBSUB_NOT_FOUND"}"#.to_string()
    };
    (state.status, body)
}

/// Start a fake sidecar answering publishes with `status`; returns its base URL.
async fn start_fake_sidecar(status: StatusCode) -> (String, FakeSidecar) {
    let state = FakeSidecar {
        published: Arc::new(Mutex::new(Vec::new())),
        status,
    };

    let app = Router::new()
        .route("/v1.0/publish/{bus}/{topic}", post(publish_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

#[tokio::test]
async fn test_sidecar_client_posts_camel_case_envelope() {
    let (url, sidecar) = start_fake_sidecar(StatusCode::NO_CONTENT).await;
    let client = SidecarClient::new(url, Duration::from_secs(5)).unwrap();

    client
        .publish("messagebus", "a", &MessageEvent::new("OrderCreated", "hello"))
        .await
        .unwrap();

    let published = sidecar.published.lock().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].bus, "messagebus");
    assert_eq!(published[0].topic, "a");
    assert_eq!(published[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        published[0].body,
        serde_json::json!({"messageType": "OrderCreated", "message": "hello"})
    );
}

#[tokio::test]
async fn test_sidecar_client_reports_rejection() {
    let (url, sidecar) = start_fake_sidecar(StatusCode::NOT_FOUND).await;
    let client = SidecarClient::new(url, Duration::from_secs(5)).unwrap();

    let err = client
        .publish("missing", "a", &MessageEvent::new("OrderCreated", "hello"))
        .await
        .unwrap_err();

    match err {
        PublishError::Rejected { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("ERR_PUBSUB_NOT_FOUND"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(sidecar.published.lock().await.len(), 1);
}

/// Start a relay publishing through the sidecar at `sidecar_url`.
async fn start_relay(sidecar_url: String) -> (String, broadcast::Sender<()>) {
    let config = RelayConfig::default();
    let log = Arc::new(MemoryLog::new());
    let broker = Arc::new(SidecarClient::new(sidecar_url, Duration::from_secs(5)).unwrap());
    let publisher = Arc::new(PublishHandler::new(broker, log.clone(), &config.pubsub));
    let state = AppState::new(publisher, Arc::new(SubscriptionRegistry::new()), log);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        serve(listener, state, shutdown_rx).await.unwrap();
    });

    (format!("http://{}", addr), shutdown_tx)
}

#[tokio::test]
async fn test_relay_publishes_once_through_sidecar() {
    let (sidecar_url, sidecar) = start_fake_sidecar(StatusCode::NO_CONTENT).await;
    let (relay_url, shutdown) = start_relay(sidecar_url).await;

    let response = reqwest::Client::new()
        .post(format!("{}/publish", relay_url))
        .body("order 7")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");

    let published = sidecar.published.lock().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].body["message"], "order 7");
    assert_eq!(published[0].body["messageType"], "OrderCreated");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_relay_propagates_sidecar_status_without_retry() {
    let (sidecar_url, sidecar) = start_fake_sidecar(StatusCode::INTERNAL_SERVER_ERROR).await;
    let (relay_url, shutdown) = start_relay(sidecar_url).await;

    let response = reqwest::Client::new()
        .post(format!("{}/publish", relay_url))
        .body("order 8")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(sidecar.published.lock().await.len(), 1);

    let _ = shutdown.send(());
}
