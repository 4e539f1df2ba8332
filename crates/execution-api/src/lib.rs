//! Execution API - control protocol for the consensus layer
//!
//! The consensus layer drives block production through this interface:
//! - Genesis parameters, block reads and batch reads
//! - ExecuteBlock, the only path that creates blocks
//! - Soft/firm commitment reads and updates
//!
//! `ExecutionService` is the capability set; `ExecutionServer` implements it
//! over a shared `Ledger`, and `ExecutionRpcServer` exposes any implementation
//! as JSON-RPC over HTTP.

pub mod encoding;
pub mod error;
pub mod http_server;
pub mod service;
pub mod types;

pub use error::ExecutionError;
pub use http_server::ExecutionRpcServer;
pub use service::{ExecutionServer, ExecutionService};
pub use types::*;
