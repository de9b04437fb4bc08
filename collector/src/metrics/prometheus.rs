//! Prometheus registry wrapper and text exposition.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry with the btcd collector registered into it, and encodes a
//! scrape in the text exposition format. On Linux the exporter's own
//! process metrics (`process_*`) are registered alongside. The registry is
//! passed explicitly to the HTTP layer; nothing is registered globally.

use prometheus::{Encoder, Registry, TextEncoder};

use crate::metrics::collector::BtcdCollector;
use crate::rpc::NodeRpc;

/// `Content-Type` of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Wrapper around a Prometheus registry.
///
/// This is the handle the HTTP layer holds. It can be wrapped in an
/// [`std::sync::Arc`] and shared across threads/tasks. Gathering runs every
/// registered collector synchronously, so it must be called from a context
/// where blocking is allowed.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Creates a registry with `collector` registered into it, plus the
    /// process collector where the platform supports it.
    ///
    /// Process metrics are independent of the node, so they are reported
    /// even when `btcd_up` is 0.
    pub fn with_collector<N>(collector: BtcdCollector<N>) -> Result<Self, prometheus::Error>
    where
        N: NodeRpc + 'static,
    {
        let metrics = Self::new();
        metrics.registry.register(Box::new(collector))?;

        #[cfg(target_os = "linux")]
        metrics.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(metrics)
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        encoded_text(buffer)
    }
}

/// Converts encoder output to a response body, empty if it is not UTF-8.
fn encoded_text(buffer: Vec<u8>) -> String {
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "encoded Prometheus metrics are not valid UTF-8");
            String::new()
        }
    }
}
