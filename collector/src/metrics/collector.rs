//! Collect-on-scrape bridge from a btcd node to Prometheus metric families.
//!
//! [`BtcdCollector`] implements [`prometheus::core::Collector`]: every call to
//! `collect()` runs one full fetch sequence against the node and renders the
//! result. If any upstream query fails, the scrape contains only
//! `btcd_up 0` and the cause is logged.

use std::collections::HashMap;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, Opts};

use crate::config::CollectorConfig;
use crate::rpc::{NodeRpc, RpcError};
use crate::types::Snapshot;

/// Namespace prefix applied to every exported metric.
pub const NAMESPACE: &str = "btcd";

/// Prometheus value kind of a metric.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Static metadata for one exported metric.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetricDescriptor {
    /// Name without the namespace prefix.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

impl MetricDescriptor {
    /// Fully-qualified name, e.g. `btcd_peers`.
    pub fn fq_name(&self) -> String {
        format!("{NAMESPACE}_{}", self.name)
    }

    fn opts(&self) -> Opts {
        Opts::new(self.name, self.help).namespace(NAMESPACE)
    }
}

pub const UP: MetricDescriptor = MetricDescriptor {
    name: "up",
    help: "Was the last btcd query successful.",
    kind: MetricKind::Gauge,
};

pub const BLOCKS: MetricDescriptor = MetricDescriptor {
    name: "blocks_total",
    help: "How many blocks are reported by btcd getinfo.",
    kind: MetricKind::Counter,
};

pub const PEERS: MetricDescriptor = MetricDescriptor {
    name: "peers",
    help: "How many peers are reported by btcd getinfo.",
    kind: MetricKind::Gauge,
};

pub const DIFFICULTY: MetricDescriptor = MetricDescriptor {
    name: "difficulty",
    help: "What is difficulty reported by btcd getinfo.",
    kind: MetricKind::Gauge,
};

pub const BYTES_SENT: MetricDescriptor = MetricDescriptor {
    name: "sent_bytes",
    help: "How many bytes have been sent reported by btcd getnettotals.",
    kind: MetricKind::Counter,
};

pub const BYTES_RECEIVED: MetricDescriptor = MetricDescriptor {
    name: "received_bytes",
    help: "How many bytes have been received reported by btcd getnettotals.",
    kind: MetricKind::Gauge,
};

pub const LATEST_BLOCK: MetricDescriptor = MetricDescriptor {
    name: "latest_block_timestamp",
    help: "Timestamp of the latest block in the chain. According to block header information.",
    kind: MetricKind::Gauge,
};

/// Every metric this collector can export, liveness first.
pub const DESCRIPTORS: [MetricDescriptor; 7] = [
    UP,
    BLOCKS,
    PEERS,
    DIFFICULTY,
    BYTES_SENT,
    BYTES_RECEIVED,
    LATEST_BLOCK,
];

/// One rendered value for one descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub descriptor: MetricDescriptor,
    pub value: f64,
}

impl Sample {
    fn new(descriptor: MetricDescriptor, value: f64) -> Self {
        Self { descriptor, value }
    }

    fn into_families(self) -> Result<Vec<MetricFamily>, prometheus::Error> {
        let opts = self.descriptor.opts();
        match self.descriptor.kind {
            MetricKind::Gauge => {
                let gauge = Gauge::with_opts(opts)?;
                gauge.set(self.value);
                Ok(gauge.collect())
            }
            MetricKind::Counter => {
                let counter = Counter::with_opts(opts)?;
                counter.inc_by(self.value);
                Ok(counter.collect())
            }
        }
    }
}

/// Renders the samples of one scrape.
///
/// With a snapshot this is `up = 1` followed by one sample per field; without
/// one it is `up = 0` alone.
pub fn render(snapshot: Option<&Snapshot>) -> Vec<Sample> {
    let Some(s) = snapshot else {
        return vec![Sample::new(UP, 0.0)];
    };

    let mut samples = vec![
        Sample::new(UP, 1.0),
        Sample::new(BLOCKS, s.block_height as f64),
        Sample::new(PEERS, s.peer_count as f64),
        Sample::new(DIFFICULTY, s.difficulty),
        Sample::new(BYTES_SENT, s.bytes_sent as f64),
        Sample::new(BYTES_RECEIVED, s.bytes_received as f64),
    ];
    if let Some(ts) = s.latest_block_timestamp {
        samples.push(Sample::new(LATEST_BLOCK, ts as f64));
    }
    samples
}

/// Prometheus collector backed by a live node session.
///
/// The collector holds no mutable state: the node handle and the
/// descriptors are shared read-only by every concurrent scrape.
pub struct BtcdCollector<N> {
    node: N,
    cfg: CollectorConfig,
    descs: Vec<Desc>,
}

impl<N: NodeRpc> BtcdCollector<N> {
    /// Constructs a collector over `node`.
    pub fn new(node: N, cfg: CollectorConfig) -> Result<Self, prometheus::Error> {
        let descs = DESCRIPTORS
            .iter()
            .filter(|d| cfg.fetch_best_block || **d != LATEST_BLOCK)
            .map(|d| {
                Desc::new(
                    d.fq_name(),
                    d.help.to_string(),
                    Vec::new(),
                    HashMap::new(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { node, cfg, descs })
    }

    #[cfg(test)]
    fn node(&self) -> &N {
        &self.node
    }

    /// Runs the fetch sequence once.
    ///
    /// Queries run strictly in order and stop at the first failure, so a
    /// snapshot never mixes fresh fields with missing ones.
    pub fn fetch_snapshot(&self) -> Result<Snapshot, RpcError> {
        let info = self.node.get_info()?;
        let totals = self.node.get_net_totals()?;

        let latest_block_timestamp = if self.cfg.fetch_best_block {
            let best = self.node.get_best_block_hash()?;
            let header = self.node.get_block_header(&best)?;
            Some(header.time)
        } else {
            None
        };

        Ok(Snapshot {
            block_height: info.blocks,
            peer_count: info.connections,
            difficulty: info.difficulty,
            bytes_sent: totals.total_bytes_sent,
            bytes_received: totals.total_bytes_recv,
            latest_block_timestamp,
        })
    }

    /// Runs one collection cycle and renders it. Upstream errors are logged
    /// and folded into `up = 0`; they never reach the caller.
    pub fn samples(&self) -> Vec<Sample> {
        match self.fetch_snapshot() {
            Ok(snapshot) => {
                tracing::debug!(
                    height = snapshot.block_height,
                    peers = snapshot.peer_count,
                    "btcd snapshot collected"
                );
                render(Some(&snapshot))
            }
            Err(e) => {
                tracing::warn!(error = %e, "btcd query failed, reporting up=0");
                render(None)
            }
        }
    }
}

impl<N: NodeRpc> Collector for BtcdCollector<N> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        for sample in self.samples() {
            match sample.into_families() {
                Ok(mut mfs) => families.append(&mut mfs),
                Err(e) => tracing::error!(
                    metric = sample.descriptor.name,
                    error = %e,
                    "failed to build metric family"
                ),
            }
        }
        families
    }
}
