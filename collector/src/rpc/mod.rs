//! Upstream client adapter for the btcd JSON-RPC interface.
//!
//! This module defines the [`NodeRpc`] trait that abstracts over a session
//! with one remote node, the result types of the four queries the collector
//! needs, and the [`RpcError`] taxonomy. The concrete HTTP implementation
//! lives in [`http::BtcdRpcClient`].

use std::fmt;

use serde::Deserialize;

use crate::types::BlockHash;

pub mod http;

pub use http::BtcdRpcClient;

/// Subset of the `getinfo` result used by the collector.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NodeInfo {
    /// Current chain height.
    pub blocks: u64,
    /// Number of active peer connections.
    pub connections: u64,
    /// Current proof-of-work difficulty.
    pub difficulty: f64,
}

/// Subset of the `getnettotals` result.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NetTotals {
    #[serde(rename = "totalbytesrecv")]
    pub total_bytes_recv: u64,
    #[serde(rename = "totalbytessent")]
    pub total_bytes_sent: u64,
}

/// Subset of the verbose `getblockheader` result.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BlockHeader {
    /// Block timestamp in Unix seconds.
    pub time: i64,
}

/// Errors that can occur while talking to the node.
#[derive(Debug)]
pub enum RpcError {
    /// Transport-level error (connection refused, TLS failure, timeout).
    Transport(String),
    /// The node answered with a non-success HTTP status and no JSON-RPC
    /// body, e.g. `401` on bad credentials.
    Http { status: u16, body: String },
    /// The node returned a JSON-RPC error object.
    Rpc { code: i64, message: String },
    /// The response was malformed or missing its result.
    Protocol(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "transport error: {msg}"),
            RpcError::Http { status, body } if body.is_empty() => {
                write!(f, "node returned HTTP status {status}")
            }
            RpcError::Http { status, body } => {
                write!(f, "node returned HTTP status {status}: {body}")
            }
            RpcError::Rpc { code, message } => write!(f, "rpc error {code}: {message}"),
            RpcError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

/// Synchronous session with a single btcd node.
///
/// Every method is one blocking round trip. Implementations must be safe to
/// call from several scrapes at once, either because the underlying session
/// tolerates interleaved calls or because they serialize access internally.
pub trait NodeRpc: Send + Sync {
    fn get_info(&self) -> Result<NodeInfo, RpcError>;

    fn get_net_totals(&self) -> Result<NetTotals, RpcError>;

    fn get_best_block_hash(&self) -> Result<BlockHash, RpcError>;

    fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeader, RpcError>;
}
