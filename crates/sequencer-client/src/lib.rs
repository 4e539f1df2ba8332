//! Sequencer Client - submission path to the sequencing layer
//!
//! Wraps user payloads in sequence actions, signs them with the rollup's
//! sequencer account and broadcasts them synchronously:
//! - Client-side nonce cache, advanced once per accepted transaction
//! - One automatic resubmission after a nonce conflict

pub mod client;
pub mod error;
pub mod submitter;
pub mod transaction;

pub use client::{BroadcastResult, JsonRpcSequencerClient, SequencerClient};
pub use error::SubmitError;
pub use submitter::{SequencerSubmitter, SubmitReceipt, NONCE_CONFLICT_CODE};
pub use transaction::{
    address_from_key, rollup_id_from_name, Action, Address, RollupId, SequenceAction,
    SignedTransaction, UnsignedTransaction,
};
