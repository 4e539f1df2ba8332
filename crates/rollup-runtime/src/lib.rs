//! Rollup Runtime - block ledger for the messenger rollup
//!
//! This crate owns the rollup's chain state:
//! - Blocks built from sequenced transaction batches
//! - Soft/firm commitment cursors driven by the consensus layer
//! - A bounded, non-blocking notification channel for appended blocks

pub mod block;
pub mod error;
pub mod ledger;


pub use block::{hash_transactions, Block, BlockHash, Height};
pub use error::LedgerError;
pub use ledger::{notification_channel, BlockNotifier, BlockReceiver, CommitmentState, Ledger};

/// Parent hash recorded on the genesis block
pub const GENESIS_PARENT_HASH: BlockHash = [0u8; 32];

/// Default capacity of the append-notification channel
pub const NOTIFICATION_CAPACITY: usize = 20;
