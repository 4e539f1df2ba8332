//! HTTP JSON-RPC Server
//!
//! Exposes an `ExecutionService` to the consensus layer as JSON-RPC over HTTP.

use crate::{
    error::ExecutionError,
    service::ExecutionService,
    types::{
        BatchGetBlocksRequest, BatchGetBlocksResponse, ExecuteBlockRequest, GetBlockRequest,
        UpdateCommitmentStateRequest,
    },
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// HTTP server for the execution control protocol
pub struct ExecutionRpcServer {
    service: Arc<dyn ExecutionService>,
}

impl ExecutionRpcServer {
    /// Create a new execution RPC server
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        Self { service }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.service)
    }

    /// Run the server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Execution API listening on {}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Handle JSON-RPC request
async fn handle_rpc(
    State(service): State<Arc<dyn ExecutionService>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let result = dispatch_method(service.as_ref(), &request.method, request.params).await;

    let response = match result {
        Ok(value) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: Some(value),
            error: None,
        },
        Err(e) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: None,
            error: Some(JsonRpcError {
                code: error_code(&e),
                message: e.to_string(),
            }),
        },
    };

    (StatusCode::OK, Json(response))
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}

/// Dispatch to appropriate method handler
async fn dispatch_method(
    service: &dyn ExecutionService,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    tracing::debug!("Execution method called: {}", method);
    match method {
        "getGenesisInfo" => to_value(service.get_genesis_info().await?),

        "getBlock" => {
            let request: GetBlockRequest = parse_params(params)?;
            to_value(service.get_block(request.identifier).await?)
        }

        "batchGetBlocks" => {
            let request: BatchGetBlocksRequest = parse_params(params)?;
            let blocks = service.batch_get_blocks(request.identifiers).await?;
            to_value(BatchGetBlocksResponse { blocks })
        }

        "executeBlock" => {
            let request: ExecuteBlockRequest = parse_params(params)?;
            to_value(service.execute_block(request).await?)
        }

        "getCommitmentState" => to_value(service.get_commitment_state().await?),

        "updateCommitmentState" => {
            let request: UpdateCommitmentStateRequest = parse_params(params)?;
            to_value(service.update_commitment_state(request).await?)
        }

        _ => Err(RpcError::MethodNotFound(method.to_string())),
    }
}

/// Map error to JSON-RPC error code
fn error_code(error: &RpcError) -> i32 {
    match error {
        RpcError::InvalidParams(_) => -32602,
        RpcError::MethodNotFound(_) => -32601,
        RpcError::InternalError(_) => -32603,
        RpcError::Execution(e) => match e {
            ExecutionError::NotFound(_) => -32001,
            ExecutionError::UnsupportedIdentifier(_) => -32002,
            ExecutionError::InvalidParent { .. } => -32003,
            ExecutionError::HashMismatch { .. } => -32004,
            ExecutionError::InvalidCommitment { .. } => -32005,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{service::ExecutionServer, types::GenesisInfo, CommitmentState, WireBlock};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use rollup_runtime::Ledger;
    use serde_json::json;
    use tower::ServiceExt;

    fn router() -> (Arc<Ledger>, Router) {
        let ledger = Arc::new(Ledger::genesis(vec![b"genesis".to_vec()]));
        let genesis = GenesisInfo {
            rollup_id: [1u8; 32],
            sequencer_start_height: 1,
            external_base_height: 0,
            external_height_variance: 0,
        };
        let service = Arc::new(ExecutionServer::new(ledger.clone(), genesis));
        (ledger, ExecutionRpcServer::new(service).router())
    }

    async fn call(router: &Router, method: &str, params: Value) -> JsonRpcResponse {
        let body = json!({ "jsonrpc": "2.0", "id": 7, "method": method, "params": params });
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_commitment_state_over_http() {
        let (ledger, router) = router();
        let response = call(&router, "getCommitmentState", Value::Null).await;

        assert_eq!(response.id, json!(7));
        let state: CommitmentState = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(state.soft.hash, ledger.get(0).unwrap().hash);
        assert_eq!(state.firm.number, 0);
    }

    #[tokio::test]
    async fn test_execute_block_over_http() {
        let (ledger, router) = router();
        let parent = BASE64.encode(ledger.get(0).unwrap().hash);
        let params = json!({
            "prevBlockHash": parent,
            "transactions": [BASE64.encode("a"), BASE64.encode("b")],
            "timestamp": "2024-05-01T12:00:00Z",
        });

        let response = call(&router, "executeBlock", params).await;
        let block: WireBlock = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(block.number, 1);
        assert_eq!(ledger.latest_height(), 1);

        let stale = json!({
            "prevBlockHash": parent,
            "transactions": [],
            "timestamp": "2024-05-01T12:00:01Z",
        });
        let response = call(&router, "executeBlock", stale).await;
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn test_get_block_error_codes() {
        let (_, router) = router();

        let missing = call(&router, "getBlock", json!({ "identifier": { "blockNumber": 3 } })).await;
        assert_eq!(missing.error.unwrap().code, -32001);

        let by_hash = json!({ "identifier": { "blockHash": BASE64.encode([0u8; 32]) } });
        let unsupported = call(&router, "getBlock", by_hash).await;
        assert_eq!(unsupported.error.unwrap().code, -32002);

        let by_tag = json!({ "identifier": { "blockTag": "latest" } });
        let unknown_kind = call(&router, "getBlock", by_tag).await.error.unwrap();
        assert_eq!(unknown_kind.code, -32002);
        assert!(unknown_kind.message.contains("blockTag"));

        let batch = json!({ "identifiers": [{ "blockNumber": 0 }, { "blockTag": "safe" }] });
        let batch_error = call(&router, "batchGetBlocks", batch).await;
        assert_eq!(batch_error.error.unwrap().code, -32002);
    }

    #[tokio::test]
    async fn test_transport_errors() {
        let (_, router) = router();

        let unknown = call(&router, "mineBlock", Value::Null).await;
        assert_eq!(unknown.error.unwrap().code, -32601);

        let malformed = call(&router, "updateCommitmentState", json!({ "soft": 1 })).await;
        assert_eq!(malformed.error.unwrap().code, -32602);
    }
}
