//! Metrics and exposition for the exporter.
//!
//! This module defines the static descriptor table and the collect-on-scrape
//! [`BtcdCollector`], plus a small [`MetricsRegistry`] that encodes a scrape
//! in Prometheus text format.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::sync::Arc;
//! use btcd_collector::{BtcdCollector, BtcdRpcClient, ExporterConfig, MetricsRegistry};
//!
//! let cfg: ExporterConfig = load_config()?;
//! let cert = cfg.rpc.read_certificate()?;
//! let client = BtcdRpcClient::new(&cfg.rpc, cert.as_deref())?;
//! let collector = BtcdCollector::new(client, cfg.collector)?;
//! let metrics = Arc::new(MetricsRegistry::with_collector(collector)?);
//!
//! // On every scrape, from a blocking context:
//! let body = metrics.gather_text();
//! ```

pub mod collector;
pub mod prometheus;

pub use self::collector::{
    BtcdCollector, DESCRIPTORS, MetricDescriptor, MetricKind, NAMESPACE, Sample, render,
};
pub use self::prometheus::{MetricsRegistry, TEXT_CONTENT_TYPE};
