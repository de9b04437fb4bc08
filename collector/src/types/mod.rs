//! Core domain types used by the collector
//!
//! This module defines the strongly-typed block hash returned by the node
//! and the [`Snapshot`] aggregate produced by one successful collection
//! cycle. The goal is to avoid "naked" strings and loosely-related numbers
//! in public APIs and instead use domain-specific types.

use std::fmt;
use std::str::FromStr;

/// Length in bytes of a block hash.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit block hash as reported by `getbestblockhash`.
///
/// Bytes are kept in RPC display order, so that formatting the hash back to
/// hex yields exactly the string the node sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BlockHash(pub [u8; HASH_LEN]);

impl BlockHash {
    /// Parses a 64-character hex string into a [`BlockHash`].
    pub fn from_hex(s: &str) -> Result<Self, ParseHashError> {
        let bytes = hex::decode(s.trim()).map_err(|_| ParseHashError::InvalidHex)?;
        if bytes.len() != HASH_LEN {
            return Err(ParseHashError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(BlockHash(arr))
    }

    /// Returns the lowercase hex encoding of this hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockHash::from_hex(s)
    }
}

/// Error returned when a block hash string cannot be parsed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseHashError {
    /// The string contains non-hex characters or has an odd length.
    InvalidHex,
    /// The decoded hash has the wrong number of bytes.
    InvalidLength(usize),
}

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseHashError::InvalidHex => write!(f, "block hash is not valid hex"),
            ParseHashError::InvalidLength(n) => {
                write!(f, "block hash has {n} bytes, expected {HASH_LEN}")
            }
        }
    }
}

impl std::error::Error for ParseHashError {}

/// Everything one collection cycle learned about the node.
///
/// A `Snapshot` only exists when every upstream query of the cycle
/// succeeded; there is no partially-filled variant. It is built fresh for
/// each scrape and dropped once the scrape has been rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Chain height reported by `getinfo`.
    pub block_height: u64,
    /// Number of active peer connections reported by `getinfo`.
    pub peer_count: u64,
    /// Proof-of-work difficulty reported by `getinfo`.
    pub difficulty: f64,
    /// Total bytes sent over the node's process lifetime.
    pub bytes_sent: u64,
    /// Total bytes received over the node's process lifetime.
    pub bytes_received: u64,
    /// Unix timestamp of the best block header.
    ///
    /// `None` when best-block tracking is disabled for this collector.
    pub latest_block_timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    #[test]
    fn block_hash_hex_roundtrip_keeps_display_order() {
        let hash: BlockHash = GENESIS.parse().expect("genesis hash should parse");
        assert_eq!(hash.as_bytes()[0], 0x00);
        assert_eq!(hash.as_bytes()[HASH_LEN - 1], 0x6f);
        assert_eq!(hash.to_string(), GENESIS);
    }

    #[test]
    fn block_hash_rejects_bad_input() {
        assert_eq!(
            BlockHash::from_hex("zz").unwrap_err(),
            ParseHashError::InvalidHex
        );
        assert_eq!(
            BlockHash::from_hex("abcd").unwrap_err(),
            ParseHashError::InvalidLength(2)
        );
    }
}
