//! Node Configuration

use clap::{builder::RangedU64ValueParser, Parser};
use ed25519_dalek::SigningKey;
use execution_api::GenesisInfo;
use rollup_feed::FeedConfig;
use sequencer_client::{rollup_id_from_name, RollupId};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Sequencer key is not valid hex: {0}")]
    KeyEncoding(#[from] hex::FromHexError),

    #[error("Sequencer key must be a 32-byte ed25519 seed, got {0} bytes")]
    KeyLength(usize),
}

fn non_zero() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

/// Messenger rollup node
#[derive(Parser, Debug, Clone)]
#[command(name = "messenger-rollup")]
#[command(about = "Messenger rollup execution node", long_about = None)]
pub struct Args {
    /// Sequencer JSON-RPC URL
    #[arg(long, env = "SEQUENCER_RPC", default_value = "http://localhost:26657")]
    pub sequencer_rpc: String,

    /// Execution API bind address
    #[arg(long, env = "CONDUCTOR_RPC", default_value = "0.0.0.0:50051")]
    pub conductor_rpc: String,

    /// REST API bind address
    #[arg(long, env = "RESTAPI_PORT", default_value = "0.0.0.0:8080")]
    pub restapi_addr: String,

    /// WebSocket feed bind address
    #[arg(long, env = "FEED_ADDR", default_value = "0.0.0.0:8081")]
    pub feed_addr: String,

    /// Rollup name; its SHA-256 is the rollup ID
    #[arg(long, env = "ROLLUP_NAME", default_value = "messenger-rollup")]
    pub rollup_name: String,

    /// Hex-encoded ed25519 seed of the sequencer account
    #[arg(long, env = "SEQUENCER_PRIVATE", hide_env_values = true)]
    pub sequencer_private: String,

    /// Sequencer height at which execution begins
    #[arg(long, env = "SEQUENCER_START_HEIGHT", default_value = "1")]
    pub sequencer_start_height: u32,

    /// External chain height to start tracking from
    #[arg(long, env = "EXTERNAL_BASE_HEIGHT", default_value = "0")]
    pub external_base_height: u32,

    /// Allowed variance in external chain heights
    #[arg(long, env = "EXTERNAL_HEIGHT_VARIANCE", default_value = "0")]
    pub external_height_variance: u32,

    /// Seconds a feed subscriber may go without answering a ping
    #[arg(long, default_value = "10")]
    pub pong_wait_secs: u64,

    /// Outbound queue capacity per feed subscriber
    #[arg(long, default_value = "50", value_parser = non_zero())]
    pub subscriber_queue: usize,

    /// Capacity of the block notification channel
    #[arg(long, default_value = "20", value_parser = non_zero())]
    pub notification_capacity: usize,

    /// Sequencer request timeout in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn rollup_id(&self) -> RollupId {
        rollup_id_from_name(&self.rollup_name)
    }

    pub fn genesis_info(&self) -> GenesisInfo {
        GenesisInfo {
            rollup_id: self.rollup_id(),
            sequencer_start_height: self.sequencer_start_height,
            external_base_height: self.external_base_height,
            external_height_variance: self.external_height_variance,
        }
    }

    /// Decode the sequencer signing key
    pub fn signing_key(&self) -> Result<SigningKey, ConfigError> {
        let bytes = hex::decode(self.sequencer_private.trim_start_matches("0x"))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ConfigError::KeyLength(b.len()))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            queue_capacity: self.subscriber_queue,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
