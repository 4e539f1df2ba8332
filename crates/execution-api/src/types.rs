//! Control protocol request/response types

use crate::encoding::{self, Payload};
use chrono::{DateTime, Utc};
use rollup_runtime::{Block, BlockHash, Height};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rollup genesis parameters, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisInfo {
    #[serde(with = "encoding::hash")]
    pub rollup_id: [u8; 32],
    /// Sequencer height at which this rollup's execution begins
    pub sequencer_start_height: u32,
    /// External (data availability) chain height to start tracking from
    pub external_base_height: u32,
    /// Allowed variance in external chain heights
    pub external_height_variance: u32,
}

/// Selects a block. Only heights are served.
///
/// Unrecognized kinds deserialize into `Other` so they can be rejected as
/// unsupported rather than as malformed params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawIdentifier")]
pub enum BlockIdentifier {
    BlockNumber(Height),
    BlockHash(#[serde(with = "encoding::bytes")] Vec<u8>),
    /// Kind name of an identifier this rollup does not understand
    #[serde(skip_serializing)]
    Other(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum KnownIdentifier {
    BlockNumber(Height),
    BlockHash(#[serde(with = "encoding::bytes")] Vec<u8>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Known(KnownIdentifier),
    Other(Value),
}

impl From<RawIdentifier> for BlockIdentifier {
    fn from(raw: RawIdentifier) -> Self {
        match raw {
            RawIdentifier::Known(KnownIdentifier::BlockNumber(height)) => Self::BlockNumber(height),
            RawIdentifier::Known(KnownIdentifier::BlockHash(hash)) => Self::BlockHash(hash),
            RawIdentifier::Other(Value::Object(map)) => {
                Self::Other(map.keys().cloned().collect::<Vec<_>>().join(","))
            }
            RawIdentifier::Other(value) => Self::Other(value.to_string()),
        }
    }
}

/// Block as seen by the consensus layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBlock {
    pub number: Height,
    #[serde(with = "encoding::hash")]
    pub hash: BlockHash,
    #[serde(with = "encoding::hash")]
    pub parent_block_hash: BlockHash,
    pub timestamp: DateTime<Utc>,
}

impl From<&Block> for WireBlock {
    fn from(block: &Block) -> Self {
        Self {
            number: block.height,
            hash: block.hash,
            parent_block_hash: block.parent_hash,
            timestamp: block.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlockRequest {
    pub identifier: BlockIdentifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetBlocksRequest {
    pub identifiers: Vec<BlockIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGetBlocksResponse {
    pub blocks: Vec<WireBlock>,
}

/// Instruction to execute a sequenced batch on top of `prev_block_hash`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBlockRequest {
    #[serde(with = "encoding::hash")]
    pub prev_block_hash: BlockHash,
    #[serde(default)]
    pub transactions: Vec<Payload>,
    pub timestamp: DateTime<Utc>,
}

/// Soft and firm blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentState {
    pub soft: WireBlock,
    pub firm: WireBlock,
}

impl From<&rollup_runtime::CommitmentState> for CommitmentState {
    fn from(state: &rollup_runtime::CommitmentState) -> Self {
        Self {
            soft: WireBlock::from(state.soft.as_ref()),
            firm: WireBlock::from(state.firm.as_ref()),
        }
    }
}

/// Height and hash the consensus layer believes a cursor should point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: Height,
    #[serde(with = "encoding::hash")]
    pub hash: BlockHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommitmentStateRequest {
    pub soft: BlockRef,
    pub firm: BlockRef,
}
