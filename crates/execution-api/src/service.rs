//! Execution Service - control protocol handlers
//!
//! Implements the execution capability set over the rollup ledger.

use crate::{
    error::ExecutionError,
    types::{
        BlockIdentifier, CommitmentState, ExecuteBlockRequest, GenesisInfo,
        UpdateCommitmentStateRequest, WireBlock,
    },
};
use async_trait::async_trait;
use rollup_runtime::Ledger;
use std::sync::Arc;

/// Capability set the consensus layer depends on
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Rollup identifier and starting heights
    async fn get_genesis_info(&self) -> Result<GenesisInfo, ExecutionError>;

    /// Fetch one block by height
    async fn get_block(&self, identifier: BlockIdentifier) -> Result<WireBlock, ExecutionError>;

    /// Fetch several blocks; the first failure fails the whole batch
    async fn batch_get_blocks(
        &self,
        identifiers: Vec<BlockIdentifier>,
    ) -> Result<Vec<WireBlock>, ExecutionError>;

    /// Execute a sequenced batch as the next block
    async fn execute_block(&self, request: ExecuteBlockRequest)
        -> Result<WireBlock, ExecutionError>;

    /// Current soft and firm blocks
    async fn get_commitment_state(&self) -> Result<CommitmentState, ExecutionError>;

    /// Move the soft and firm cursors
    async fn update_commitment_state(
        &self,
        request: UpdateCommitmentStateRequest,
    ) -> Result<CommitmentState, ExecutionError>;
}

/// Ledger-backed execution service
pub struct ExecutionServer {
    ledger: Arc<Ledger>,
    genesis: GenesisInfo,
}

impl ExecutionServer {
    /// Create a new execution server
    pub fn new(ledger: Arc<Ledger>, genesis: GenesisInfo) -> Self {
        Self { ledger, genesis }
    }

    fn block_by_identifier(&self, identifier: &BlockIdentifier) -> Result<WireBlock, ExecutionError> {
        match identifier {
            BlockIdentifier::BlockNumber(height) => {
                let block = self.ledger.get(*height)?;
                Ok(WireBlock::from(block.as_ref()))
            }
            BlockIdentifier::BlockHash(_) => {
                Err(ExecutionError::UnsupportedIdentifier("blockHash".to_string()))
            }
            BlockIdentifier::Other(kind) => Err(ExecutionError::UnsupportedIdentifier(kind.clone())),
        }
    }
}

#[async_trait]
impl ExecutionService for ExecutionServer {
    async fn get_genesis_info(&self) -> Result<GenesisInfo, ExecutionError> {
        tracing::debug!("GetGenesisInfo called");
        Ok(self.genesis.clone())
    }

    async fn get_block(&self, identifier: BlockIdentifier) -> Result<WireBlock, ExecutionError> {
        tracing::debug!("GetBlock called: {:?}", identifier);
        self.block_by_identifier(&identifier)
    }

    async fn batch_get_blocks(
        &self,
        identifiers: Vec<BlockIdentifier>,
    ) -> Result<Vec<WireBlock>, ExecutionError> {
        tracing::debug!("BatchGetBlocks called for {} identifiers", identifiers.len());
        identifiers
            .iter()
            .map(|identifier| self.block_by_identifier(identifier))
            .collect()
    }

    async fn execute_block(
        &self,
        request: ExecuteBlockRequest,
    ) -> Result<WireBlock, ExecutionError> {
        let transactions: Vec<Vec<u8>> = request.transactions.into_iter().map(|p| p.0).collect();
        let tx_count = transactions.len();

        let block = self
            .ledger
            .append(request.prev_block_hash, transactions, request.timestamp)
            .inspect_err(|e| tracing::warn!("ExecuteBlock rejected: {}", e))?;

        tracing::info!("Executed block {} ({} txs)", block.height, tx_count);
        Ok(WireBlock::from(block.as_ref()))
    }

    async fn get_commitment_state(&self) -> Result<CommitmentState, ExecutionError> {
        let state = self.ledger.commitment_state()?;
        Ok(CommitmentState::from(&state))
    }

    async fn update_commitment_state(
        &self,
        request: UpdateCommitmentStateRequest,
    ) -> Result<CommitmentState, ExecutionError> {
        tracing::debug!(
            "UpdateCommitmentState called: soft {}, firm {}",
            request.soft.number,
            request.firm.number
        );

        let state = self.ledger.update_commitment(
            request.soft.number,
            request.firm.number,
            request.soft.hash,
            request.firm.hash,
        )?;

        Ok(CommitmentState::from(&state))
    }
}
