//! btcd collector library crate.
//!
//! This crate provides the building blocks of the btcd Prometheus exporter:
//!
//! - strongly-typed domain types (`types`),
//! - the upstream JSON-RPC adapter (`rpc`),
//! - the collect-on-scrape collector and text exposition (`metrics`),
//! - and the resolved process configuration (`config`).
//!
//! The exporter binary composes these pieces with an HTTP server.

pub mod config;
pub mod metrics;
pub mod rpc;
pub mod types;

// Re-export top-level configuration types.
pub use config::{CollectorConfig, ConfigError, ExporterConfig, RpcConfig, TlsConfig};

// Re-export the upstream adapter and its HTTP client.
pub use rpc::{BlockHeader, BtcdRpcClient, NetTotals, NodeInfo, NodeRpc, RpcError};

// Re-export the collector and registry.
pub use metrics::{BtcdCollector, MetricsRegistry, TEXT_CONTENT_TYPE};

// Re-export domain types at the crate root for convenience.
pub use types::*;
