//! Broadcast Hub - registry of feed subscribers
//!
//! Membership changes only on explicit register/unregister. Broadcasting
//! iterates the registry under its read lock and never blocks: a subscriber
//! whose queue is full misses the message.

use crate::FeedError;
use parking_lot::RwLock;
use rollup_runtime::BlockReceiver;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Subscriber ID
pub type SubscriberId = u64;

/// Serialized feed message shared by every subscriber queue
pub type FeedMessage = Arc<str>;

/// Receiving end handed to a subscriber connection
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<FeedMessage>,
}

/// Result of one broadcast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

/// Turns a block's payloads into one feed message
pub trait FeedFormatter: Send + Sync {
    /// `None` skips the block
    fn format(&self, transactions: &[Vec<u8>]) -> Option<String>;
}

struct Registry {
    subscribers: HashMap<SubscriberId, mpsc::Sender<FeedMessage>>,
    closed: bool,
}

/// Fans feed messages out to registered subscribers
pub struct BroadcastHub {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl BroadcastHub {
    /// Create a hub whose subscribers each get a queue of `queue_capacity`
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: RwLock::new(Registry {
                subscribers: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber
    pub fn register(&self) -> Result<Subscription, FeedError> {
        let mut registry = self.registry.write();
        if registry.closed {
            return Err(FeedError::HubClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        registry.subscribers.insert(id, sender);

        tracing::debug!("Registered subscriber {}", id);
        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber; its queue closes once drained
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.registry.write().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Unregistered subscriber {}", id);
        }
        removed
    }

    /// Enqueue a message to every registered subscriber
    pub fn broadcast(&self, message: &str) -> BroadcastOutcome {
        let message: FeedMessage = Arc::from(message);
        let registry = self.registry.read();
        let mut outcome = BroadcastOutcome::default();

        for (id, sender) in registry.subscribers.iter() {
            match sender.try_send(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Subscriber {} queue full, dropping message", id);
                    outcome.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Subscriber {} is disconnecting, dropping message", id);
                    outcome.dropped += 1;
                }
            }
        }

        outcome
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    /// Drop every subscriber and refuse new ones
    pub fn close(&self) {
        let mut registry = self.registry.write();
        registry.closed = true;
        let count = registry.subscribers.len();
        registry.subscribers.clear();
        tracing::info!("Broadcast hub closed, released {} subscribers", count);
    }
}

/// Drain append notifications into the hub until the channel closes.
///
/// Blocks without transactions are skipped, as are blocks the formatter
/// declines.
pub async fn run_block_pump<F: FeedFormatter>(
    hub: Arc<BroadcastHub>,
    formatter: F,
    mut blocks: BlockReceiver,
) {
    while let Some(block) = blocks.recv().await {
        if !block.has_transactions() {
            continue;
        }

        let Some(message) = formatter.format(&block.transactions) else {
            tracing::debug!("Block {} produced no feed message", block.height);
            continue;
        };

        let outcome = hub.broadcast(&message);
        tracing::debug!(
            "Block {} fanned out: {} delivered, {} dropped",
            block.height,
            outcome.delivered,
            outcome.dropped
        );
    }

    tracing::info!("Block pump stopped");
}
