//! REST API
//!
//! User-facing reads over the ledger and message submission through the
//! sequencer.

use crate::message::{decode_all, UserMessage};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rollup_runtime::{Block, Height, Ledger, LedgerError};
use sequencer_client::{SequencerSubmitter, SubmitError, SubmitReceipt};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Messages returned by `/recent`
pub const RECENT_LIMIT: usize = 100;

#[derive(Clone)]
pub struct RestState {
    pub ledger: Arc<Ledger>,
    pub submitter: Arc<SequencerSubmitter>,
}

/// Block with its payloads decoded
#[derive(Debug, Serialize)]
pub struct BlockView {
    pub height: Height,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<UserMessage>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash_hex(),
            parent_hash: hex::encode(block.parent_hash),
            timestamp: block.timestamp,
            messages: decode_all(&block.transactions),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Malformed message: {0}")]
    BadRequest(String),

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmitError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = match &self {
            RestError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            RestError::Ledger(_) | RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RestError::Submission(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Create the REST router
pub fn router(state: RestState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/block/:height", get(get_block))
        .route("/recent", get(get_recent))
        .route("/message", post(post_message))
        .layer(cors)
        .with_state(state)
}

/// Run the REST server
pub async fn run(state: RestState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn get_block(
    State(state): State<RestState>,
    Path(height): Path<Height>,
) -> Result<Json<BlockView>, RestError> {
    tracing::debug!("Getting block {}", height);
    let block = state.ledger.get(height)?;
    Ok(Json(BlockView::from(block.as_ref())))
}

async fn get_recent(State(state): State<RestState>) -> Json<Vec<UserMessage>> {
    let payloads = state.ledger.recent_transactions(RECENT_LIMIT);
    Json(decode_all(&payloads))
}

async fn post_message(
    State(state): State<RestState>,
    body: Bytes,
) -> Result<Json<SubmitReceipt>, RestError> {
    let message = UserMessage::decode(&body).map_err(|e| RestError::BadRequest(e.to_string()))?;
    let payload = message
        .encode()
        .map_err(|e| RestError::Internal(e.to_string()))?;

    let receipt = state
        .submitter
        .submit(payload)
        .await
        .inspect_err(|e| tracing::error!("Error sending message: {}", e))?;

    tracing::debug!("Message from {} submitted as {}", message.sender, receipt.tx_hash);
    Ok(Json(receipt))
}
