//! HTTP server for the relay.
//!
//! ## Routes
//! - `POST /publish` - Publish the request body to the configured topic
//! - `GET|POST /health`, `GET|POST /api/HealthCheck` - Liveness
//! - `GET /dapr/subscribe` - Subscription discovery for the sidecar
//! - `POST /topics/{topic}` - Message delivery from the sidecar
//! - `GET /metrics` - Prometheus metrics

/// Route handlers and router construction
pub mod routes;

/// Graceful shutdown handling
pub mod shutdown;

pub use routes::{create_router, serve, start_server, AppState};
