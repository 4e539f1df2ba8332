//! Execution API Errors

use rollup_runtime::{BlockHash, Height, LedgerError};
use thiserror::Error;

/// Errors surfaced to the consensus layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Block not found at height {0}")]
    NotFound(Height),

    #[error("Unsupported block identifier: {0}")]
    UnsupportedIdentifier(String),

    #[error("Invalid parent block hash")]
    InvalidParent { expected: BlockHash, actual: BlockHash },

    #[error("Commitment hash mismatch at height {height}")]
    HashMismatch {
        height: Height,
        stored: BlockHash,
        expected: BlockHash,
    },

    #[error("Invalid commitment: firm height {firm} is above soft height {soft}")]
    InvalidCommitment { soft: Height, firm: Height },
}

impl From<LedgerError> for ExecutionError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(height) => Self::NotFound(height),
            LedgerError::InvalidParent { expected, actual } => {
                Self::InvalidParent { expected, actual }
            }
            LedgerError::HashMismatch {
                height,
                stored,
                expected,
            } => Self::HashMismatch {
                height,
                stored,
                expected,
            },
            LedgerError::InvalidCommitment { soft, firm } => Self::InvalidCommitment { soft, firm },
        }
    }
}
