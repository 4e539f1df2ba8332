//! Sequencer RPC Client
//!
//! Talks to the sequencer's CometBFT JSON-RPC endpoint over HTTP.

use crate::{
    error::SubmitError,
    transaction::{Address, SignedTransaction},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jsonrpsee::{
    core::{client::ClientT, params::ObjectParams},
    http_client::{HttpClient, HttpClientBuilder},
};
use serde::Deserialize;
use std::time::Duration;

/// Outcome of a synchronous broadcast
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastResult {
    /// 0 = accepted; anything else is a rejection code
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub hash: String,
}

/// Remote operations the submitter depends on
#[async_trait]
pub trait SequencerClient: Send + Sync {
    /// Broadcast a signed transaction and wait for the check result
    async fn broadcast_tx_sync(&self, tx: &SignedTransaction) -> Result<BroadcastResult, SubmitError>;

    /// Fetch the authoritative nonce for an account
    async fn get_nonce(&self, address: &Address) -> Result<u32, SubmitError>;
}

#[derive(Debug, Deserialize)]
struct AbciQueryResult {
    response: AbciQueryResponse,
}

#[derive(Debug, Deserialize)]
struct AbciQueryResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    value: Option<String>,
}

/// HTTP JSON-RPC sequencer client
pub struct JsonRpcSequencerClient {
    client: HttpClient,
    url: String,
}

impl JsonRpcSequencerClient {
    /// Create a client for the given sequencer RPC URL
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, SubmitError> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Get the RPC URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn insert_param<V: serde::Serialize>(
    params: &mut ObjectParams,
    name: &str,
    value: V,
) -> Result<(), SubmitError> {
    params
        .insert(name, value)
        .map_err(|e| SubmitError::Encoding(e.to_string()))
}

/// Decode the little-endian u32 carried in a nonce query value
fn decode_nonce(value: Option<&str>) -> Result<u32, SubmitError> {
    let encoded = value.ok_or_else(|| SubmitError::Encoding("nonce query returned no value".to_string()))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| SubmitError::Encoding(e.to_string()))?;
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| SubmitError::Encoding(format!("nonce must be 4 bytes, got {}", b.len())))?;
    Ok(u32::from_le_bytes(raw))
}

#[async_trait]
impl SequencerClient for JsonRpcSequencerClient {
    async fn broadcast_tx_sync(&self, tx: &SignedTransaction) -> Result<BroadcastResult, SubmitError> {
        let mut params = ObjectParams::new();
        insert_param(&mut params, "tx", BASE64.encode(tx.to_bytes()?))?;

        tracing::debug!("Broadcasting tx with nonce {}", tx.transaction.nonce);
        self.client
            .request("broadcast_tx_sync", params)
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))
    }

    async fn get_nonce(&self, address: &Address) -> Result<u32, SubmitError> {
        let mut params = ObjectParams::new();
        insert_param(&mut params, "path", format!("accounts/nonce/{}", hex::encode(address)))?;
        insert_param(&mut params, "data", "")?;
        insert_param(&mut params, "height", "0")?;
        insert_param(&mut params, "prove", false)?;

        let result: AbciQueryResult = self
            .client
            .request("abci_query", params)
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        if result.response.code != 0 {
            return Err(SubmitError::NonceQuery {
                code: result.response.code,
                log: result.response.log,
            });
        }

        decode_nonce(result.response.value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nonce() {
        let encoded = BASE64.encode(9u32.to_le_bytes());
        assert_eq!(decode_nonce(Some(&encoded)).unwrap(), 9);
        assert!(decode_nonce(None).is_err());
        assert!(decode_nonce(Some(&BASE64.encode([1u8, 2]))).is_err());
    }

    #[test]
    fn test_broadcast_result_parses_cometbft_shape() {
        let raw = json!({ "code": 4, "data": "", "log": "invalid nonce", "codespace": "", "hash": "AB12" });
        let result: BroadcastResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.code, 4);
        assert_eq!(result.log, "invalid nonce");
        assert_eq!(result.hash, "AB12");
    }

    #[test]
    fn test_abci_query_response_parses() {
        let raw = json!({ "response": { "code": 0, "log": "", "value": BASE64.encode(3u32.to_le_bytes()) } });
        let result: AbciQueryResult = serde_json::from_value(raw).unwrap();
        assert_eq!(decode_nonce(result.response.value.as_deref()).unwrap(), 3);
    }
}
