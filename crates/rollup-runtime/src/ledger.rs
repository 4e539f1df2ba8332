//! Ledger - ordered block history with soft/firm commitment cursors
//!
//! Blocks are appended only on instruction from the consensus layer. Every
//! mutation takes the chain write lock, so parent validation, height
//! assignment and cursor updates never race each other.

use crate::{
    block::{Block, BlockHash, Height},
    error::LedgerError,
    GENESIS_PARENT_HASH,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Sending half of the append-notification channel
pub type BlockNotifier = mpsc::Sender<Arc<Block>>;

/// Receiving half of the append-notification channel
pub type BlockReceiver = mpsc::Receiver<Arc<Block>>;

/// Create a bounded append-notification channel (capacity at least 1)
pub fn notification_channel(capacity: usize) -> (BlockNotifier, BlockReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Blocks at the soft and firm cursors, read under one lock
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentState {
    pub soft: Arc<Block>,
    pub firm: Arc<Block>,
}

/// Chain state guarded by the ledger lock
struct ChainState {
    /// Blocks indexed by height; never empty after construction
    blocks: Vec<Arc<Block>>,
    /// Soft commitment height
    soft: Height,
    /// Firm commitment height
    firm: Height,
}

impl ChainState {
    fn block(&self, height: Height) -> Result<&Arc<Block>, LedgerError> {
        self.blocks
            .get(height as usize)
            .ok_or(LedgerError::NotFound(height))
    }

    fn latest(&self) -> Result<&Arc<Block>, LedgerError> {
        self.blocks.last().ok_or(LedgerError::NotFound(0))
    }

    fn commitment(&self) -> Result<CommitmentState, LedgerError> {
        Ok(CommitmentState {
            soft: self.block(self.soft)?.clone(),
            firm: self.block(self.firm)?.clone(),
        })
    }
}

/// Thread-safe rollup ledger
///
/// Shared between the control-protocol server and the REST layer via `Arc`.
pub struct Ledger {
    state: RwLock<ChainState>,
    /// Append notifications for the broadcast hub (optional)
    notifier: Option<BlockNotifier>,
}

impl Ledger {
    /// Create a ledger holding only the genesis block, timestamped now
    pub fn genesis(genesis_transactions: Vec<Vec<u8>>) -> Self {
        Self::genesis_at(genesis_transactions, Utc::now())
    }

    /// Create a ledger holding only the genesis block
    pub fn genesis_at(genesis_transactions: Vec<Vec<u8>>, timestamp: DateTime<Utc>) -> Self {
        let genesis = Block::new(GENESIS_PARENT_HASH, 0, genesis_transactions, timestamp);
        tracing::info!(
            "Genesis block {} with {} transactions",
            genesis.hash_hex(),
            genesis.transactions.len()
        );

        Self {
            state: RwLock::new(ChainState {
                blocks: vec![Arc::new(genesis)],
                soft: 0,
                firm: 0,
            }),
            notifier: None,
        }
    }

    /// Attach an append-notification sender
    pub fn with_notifier(mut self, notifier: BlockNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Append a block on top of the current tip.
    ///
    /// Fails with `InvalidParent` unless `parent_hash` is the tip's hash.
    pub fn append(
        &self,
        parent_hash: BlockHash,
        transactions: Vec<Vec<u8>>,
        timestamp: DateTime<Utc>,
    ) -> Result<Arc<Block>, LedgerError> {
        let mut state = self.state.write();

        let tip = state.latest()?;
        if tip.hash != parent_hash {
            return Err(LedgerError::InvalidParent {
                expected: tip.hash,
                actual: parent_hash,
            });
        }

        let height = tip.height + 1;
        let block = Arc::new(Block::new(parent_hash, height, transactions, timestamp));
        state.blocks.push(block.clone());

        tracing::debug!(
            "Appended block {} at height {} ({} txs)",
            block.hash_hex(),
            height,
            block.transactions.len()
        );

        // Notify while still holding the lock so notifications keep append order
        if block.has_transactions() {
            self.notify(&block);
        }

        Ok(block)
    }

    fn notify(&self, block: &Arc<Block>) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        match notifier.try_send(block.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Append notification channel full, dropping block {}",
                    block.height
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Append notification channel closed");
            }
        }
    }

    /// Get the block at `height`
    pub fn get(&self, height: Height) -> Result<Arc<Block>, LedgerError> {
        self.state.read().block(height).cloned()
    }

    /// Block at the soft commitment cursor
    pub fn soft_block(&self) -> Result<Arc<Block>, LedgerError> {
        let state = self.state.read();
        state.block(state.soft).cloned()
    }

    /// Block at the firm commitment cursor
    pub fn firm_block(&self) -> Result<Arc<Block>, LedgerError> {
        let state = self.state.read();
        state.block(state.firm).cloned()
    }

    /// Chain tip
    pub fn latest_block(&self) -> Result<Arc<Block>, LedgerError> {
        self.state.read().latest().cloned()
    }

    /// Height of the chain tip
    pub fn latest_height(&self) -> Height {
        let state = self.state.read();
        (state.blocks.len() - 1) as Height
    }

    /// Current soft and firm blocks
    pub fn commitment_state(&self) -> Result<CommitmentState, LedgerError> {
        self.state.read().commitment()
    }

    /// Move the commitment cursors.
    ///
    /// Both heights must exist and their stored hashes must equal the
    /// expected hashes; otherwise the cursors are left untouched.
    pub fn update_commitment(
        &self,
        soft: Height,
        firm: Height,
        expected_soft_hash: BlockHash,
        expected_firm_hash: BlockHash,
    ) -> Result<CommitmentState, LedgerError> {
        let mut state = self.state.write();

        for (height, expected) in [(soft, expected_soft_hash), (firm, expected_firm_hash)] {
            let stored = state.block(height)?.hash;
            if stored != expected {
                tracing::error!(
                    "Commitment hash mismatch at height {}: stored {}, expected {}",
                    height,
                    hex::encode(stored),
                    hex::encode(expected)
                );
                return Err(LedgerError::HashMismatch {
                    height,
                    stored,
                    expected,
                });
            }
        }

        if firm > soft {
            return Err(LedgerError::InvalidCommitment { soft, firm });
        }

        // Regression is accepted, only logged
        if soft < state.soft || firm < state.firm {
            tracing::warn!(
                "Commitment regressed: soft {} -> {}, firm {} -> {}",
                state.soft,
                soft,
                state.firm,
                firm
            );
        }

        state.soft = soft;
        state.firm = firm;
        tracing::debug!("Commitment updated: soft {}, firm {}", soft, firm);

        state.commitment()
    }

    /// The most recent `limit` transaction payloads, oldest first
    pub fn recent_transactions(&self, limit: usize) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let mut recent: Vec<Vec<u8>> = Vec::with_capacity(limit);

        'blocks: for block in state.blocks.iter().rev() {
            for tx in block.transactions.iter().rev() {
                if recent.len() >= limit {
                    break 'blocks;
                }
                recent.push(tx.clone());
            }
        }

        recent.reverse();
        recent
    }
}
