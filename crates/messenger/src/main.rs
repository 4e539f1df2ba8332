//! Messenger Rollup
//!
//! Main entry point for the messenger rollup node.
//! Serves the execution API to the consensus layer, a REST API for users,
//! and a WebSocket feed of newly executed messages.

use anyhow::Result;
use clap::Parser;
use execution_api::{ExecutionRpcServer, ExecutionServer};
use rollup_feed::{run_block_pump, BroadcastHub, FeedServer};
use rollup_runtime::{notification_channel, Ledger};
use sequencer_client::{address_from_key, JsonRpcSequencerClient, SequencerSubmitter};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod message;
mod rest;

use config::Args;
use message::{MessageFeedFormatter, UserMessage};
use rest::RestState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let genesis_info = args.genesis_info();
    let signing_key = args.signing_key()?;

    tracing::info!("Starting messenger rollup '{}'", args.rollup_name);
    tracing::info!("  Rollup ID: {}", hex::encode(genesis_info.rollup_id));
    tracing::info!("  Sequencer: {}", args.sequencer_rpc);
    tracing::info!("  Sequencer account: {}", hex::encode(address_from_key(&signing_key.verifying_key())));
    tracing::info!("  Execution API: {}", args.conductor_rpc);
    tracing::info!("  REST API: {}", args.restapi_addr);
    tracing::info!("  Feed: {}", args.feed_addr);

    // Ledger, seeded with the genesis message
    let (notifier, blocks) = notification_channel(args.notification_capacity);
    let ledger = Arc::new(
        Ledger::genesis(vec![UserMessage::genesis().encode()?]).with_notifier(notifier),
    );

    // Sequencer submission
    let client = JsonRpcSequencerClient::new(&args.sequencer_rpc, args.request_timeout())?;
    let submitter = Arc::new(SequencerSubmitter::new(
        Arc::new(client),
        signing_key,
        genesis_info.rollup_id,
    ));

    // Feed
    let hub = Arc::new(BroadcastHub::new(args.subscriber_queue));
    let pump = tokio::spawn(run_block_pump(hub.clone(), MessageFeedFormatter, blocks));

    let feed_server = FeedServer::new(hub.clone(), args.feed_config());
    let feed_addr = args.feed_addr.clone();
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed_server.run(&feed_addr).await {
            tracing::error!("Feed server error: {}", e);
        }
    });

    // Execution API
    let execution = ExecutionRpcServer::new(Arc::new(ExecutionServer::new(ledger.clone(), genesis_info)));
    let execution_addr = args.conductor_rpc.clone();
    let execution_task = tokio::spawn(async move {
        if let Err(e) = execution.run(&execution_addr).await {
            tracing::error!("Execution API error: {}", e);
        }
    });

    // REST API
    let rest_state = RestState {
        ledger: ledger.clone(),
        submitter,
    };
    let rest_addr = args.restapi_addr.clone();
    let rest_task = tokio::spawn(async move {
        if let Err(e) = rest::run(rest_state, &rest_addr).await {
            tracing::error!("REST API error: {}", e);
        }
    });

    tracing::info!("Messenger rollup running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");

    execution_task.abort();
    rest_task.abort();
    feed_task.abort();
    hub.close();
    pump.abort();

    let state = ledger.commitment_state()?;
    tracing::info!(
        "Stopped at height {} (soft {}, firm {})",
        ledger.latest_height(),
        state.soft.height,
        state.firm.height
    );

    Ok(())
}
