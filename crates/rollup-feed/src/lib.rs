//! Rollup Feed - realtime fan-out of executed transactions
//!
//! Subscribers connect over WebSocket and receive one JSON message per
//! non-empty block, in append order. Delivery is best effort: a subscriber
//! whose outbound queue is full simply misses that block.

pub mod hub;
pub mod ws_server;

pub use hub::{
    run_block_pump, BroadcastHub, BroadcastOutcome, FeedFormatter, FeedMessage, SubscriberId,
    Subscription,
};
pub use ws_server::FeedServer;

use std::time::Duration;

/// Feed errors
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Broadcast hub is closed")]
    HubClosed,

    #[error("No pong received within {0:?}")]
    PongTimeout(Duration),

    #[error("Write stalled for longer than {0:?}")]
    WriteTimeout(Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Feed configuration
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// How long a subscriber may stay silent before it is dropped
    pub pong_wait: Duration,
    /// Outbound queue capacity per subscriber
    pub queue_capacity: usize,
}

impl FeedConfig {
    /// Ping cadence; always shorter than the pong wait
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(10),
            queue_capacity: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ping_interval() {
        let config = FeedConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(9));
        assert_eq!(config.queue_capacity, 50);
    }
}
