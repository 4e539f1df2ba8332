//! Block type and transaction-set hashing

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte block digest
pub type BlockHash = [u8; 32];

/// Block height
pub type Height = u32;

/// Hash an ordered list of transaction payloads.
///
/// The digest covers the payloads concatenated in order, so reordering
/// changes the hash. Height, parent and timestamp are not part of it.
pub fn hash_transactions<T: AsRef<[u8]>>(transactions: &[T]) -> BlockHash {
    let mut hasher = Sha256::new();
    for tx in transactions {
        hasher.update(tx.as_ref());
    }
    hasher.finalize().into()
}

/// An executed rollup block
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Hash of the previous block
    pub parent_hash: BlockHash,
    /// Digest of the transaction payloads
    pub hash: BlockHash,
    /// Block height (genesis is 0)
    pub height: Height,
    /// Timestamp supplied by the consensus layer
    pub timestamp: DateTime<Utc>,
    /// Opaque transaction payloads in sequenced order
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Build a block, computing its hash from the transactions
    pub fn new(
        parent_hash: BlockHash,
        height: Height,
        transactions: Vec<Vec<u8>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            parent_hash,
            hash: hash_transactions(&transactions),
            height,
            timestamp,
            transactions,
        }
    }

    /// Whether the block carries any transactions
    pub fn has_transactions(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// Hex encoding of the block hash
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.height)
            .field("hash", &hex::encode(self.hash))
            .field("parent_hash", &hex::encode(self.parent_hash))
            .field("timestamp", &self.timestamp)
            .field("transactions", &self.transactions.len())
            .finish()
    }
}
