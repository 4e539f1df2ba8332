//! User messages carried as rollup transactions

use rollup_feed::FeedFormatter;
use serde::{Deserialize, Serialize};

/// A chat message, JSON-encoded into a transaction payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub sender: String,
    pub message: String,
    pub priority: u32,
}

impl UserMessage {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Message seeded into the genesis block
    pub fn genesis() -> Self {
        Self {
            sender: "astria".to_string(),
            message: "hello, world!".to_string(),
            priority: 0,
        }
    }
}

/// Decode every payload that is a valid message, skipping the rest
pub fn decode_all<T: AsRef<[u8]>>(payloads: &[T]) -> Vec<UserMessage> {
    payloads
        .iter()
        .filter_map(|payload| match UserMessage::decode(payload.as_ref()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!("Skipping undecodable payload: {}", e);
                None
            }
        })
        .collect()
}

/// Formats a block as the JSON array of its messages
pub struct MessageFeedFormatter;

impl FeedFormatter for MessageFeedFormatter {
    fn format(&self, transactions: &[Vec<u8>]) -> Option<String> {
        let messages = decode_all(transactions);
        if messages.is_empty() {
            return None;
        }

        match serde_json::to_string(&messages) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!("Failed to encode feed message: {}", e);
                None
            }
        }
    }
}
