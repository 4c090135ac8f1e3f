//! Metrics and monitoring using Prometheus.
//!
//! Metrics are exposed on the `/metrics` endpoint and include:
//!
//! - **Counters**: messages published and received, labelled by outcome
//! - **Histograms**: publish latency per topic

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::error;

/// Global metrics registry
static METRICS_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Global metrics instance
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    let metrics = Metrics::new();
    if let Err(e) = metrics.register(&METRICS_REGISTRY) {
        error!("Failed to register metrics: {}", e);
    }
    Arc::new(metrics)
});

/// Metrics collector for topic-relay
pub struct Metrics {
    /// Publish attempts by topic and outcome (counter)
    pub messages_published_total: IntCounterVec,
    /// Delivered messages by topic and outcome (counter)
    pub messages_received_total: IntCounterVec,
    /// Publish latency in seconds (histogram)
    pub publish_latency_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        let messages_published_total = IntCounterVec::new(
            Opts::new(
                "relay_messages_published_total",
                "Publish attempts forwarded to the broker",
            ),
            &["topic", "outcome"],
        )
        .expect("Failed to create messages_published_total metric");

        let messages_received_total = IntCounterVec::new(
            Opts::new(
                "relay_messages_received_total",
                "Messages delivered to topic subscribers",
            ),
            &["topic", "outcome"],
        )
        .expect("Failed to create messages_received_total metric");

        let publish_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "relay_publish_latency_seconds",
                "Broker publish latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["topic"],
        )
        .expect("Failed to create publish_latency_seconds metric");

        Self {
            messages_published_total,
            messages_received_total,
            publish_latency_seconds,
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.messages_published_total.clone()))?;
        registry.register(Box::new(self.messages_received_total.clone()))?;
        registry.register(Box::new(self.publish_latency_seconds.clone()))?;
        Ok(())
    }

    /// Gather metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = METRICS_REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the global metrics instance
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.clone()
}
