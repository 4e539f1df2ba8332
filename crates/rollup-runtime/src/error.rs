//! Ledger Errors

use crate::{BlockHash, Height};
use thiserror::Error;

/// Errors returned by ledger reads and mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Block not found at height {0}")]
    NotFound(Height),

    #[error("Invalid parent hash: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    InvalidParent {
        expected: BlockHash,
        actual: BlockHash,
    },

    #[error("Hash mismatch at height {height}: stored {}, expected {}", hex::encode(.stored), hex::encode(.expected))]
    HashMismatch {
        height: Height,
        stored: BlockHash,
        expected: BlockHash,
    },

    #[error("Invalid commitment: firm height {firm} is above soft height {soft}")]
    InvalidCommitment { soft: Height, firm: Height },
}
