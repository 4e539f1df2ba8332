//! Sequencer Submitter - signs and submits rollup payloads
//!
//! The cached nonce lives behind an async mutex held for the whole
//! build/sign/broadcast sequence, so concurrent submissions from this account
//! are serialized and never reuse a nonce.

use crate::{
    client::{BroadcastResult, SequencerClient},
    error::SubmitError,
    transaction::{address_from_key, Action, Address, RollupId, SequenceAction, UnsignedTransaction},
};
use ed25519_dalek::SigningKey;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Check result code signalling a stale nonce
pub const NONCE_CONFLICT_CODE: u32 = 4;

/// Receipt for an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    /// Transaction hash reported by the sequencer
    pub tx_hash: String,
    /// Nonce the accepted transaction used
    pub nonce: u32,
    /// Check result code (always 0 on success)
    pub code: u32,
}

/// Submits payloads on behalf of one sequencer account
pub struct SequencerSubmitter {
    client: Arc<dyn SequencerClient>,
    signing_key: SigningKey,
    address: Address,
    rollup_id: RollupId,
    /// Cached account nonce
    nonce: Mutex<u32>,
}

impl SequencerSubmitter {
    /// Create a submitter starting from nonce 0
    pub fn new(client: Arc<dyn SequencerClient>, signing_key: SigningKey, rollup_id: RollupId) -> Self {
        let address = address_from_key(&signing_key.verifying_key());
        Self {
            client,
            signing_key,
            address,
            rollup_id,
            nonce: Mutex::new(0),
        }
    }

    /// Set the starting nonce
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Mutex::new(nonce);
        self
    }

    /// Sequencer account address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Rollup this submitter targets
    pub fn rollup_id(&self) -> RollupId {
        self.rollup_id
    }

    /// Current cached nonce
    pub async fn cached_nonce(&self) -> u32 {
        *self.nonce.lock().await
    }

    /// Submit a payload to the sequencer.
    ///
    /// A nonce conflict triggers one refresh from the remote account and one
    /// resubmission; a second conflict is returned as `NonceConflict`.
    pub async fn submit(&self, payload: Vec<u8>) -> Result<SubmitReceipt, SubmitError> {
        let mut nonce = self.nonce.lock().await;

        let actions = vec![Action::Sequence(SequenceAction {
            rollup_id: self.rollup_id,
            data: payload,
        })];

        let mut next = next_nonce(*nonce)?;
        let mut result = self.sign_and_broadcast(*nonce, actions.clone()).await?;

        if result.code == NONCE_CONFLICT_CODE {
            let remote = self.client.get_nonce(&self.address).await?;
            tracing::warn!(
                "Nonce conflict at {}, resubmitting with remote nonce {}",
                *nonce,
                remote
            );
            *nonce = remote;
            next = next_nonce(remote)?;

            result = self.sign_and_broadcast(*nonce, actions).await?;
            if result.code == NONCE_CONFLICT_CODE {
                tracing::error!("Nonce conflict persisted at remote nonce {}", remote);
                return Err(SubmitError::NonceConflict { nonce: remote });
            }
        }

        if result.code != 0 {
            tracing::warn!("Sequencer rejected tx with code {}: {}", result.code, result.log);
            return Err(SubmitError::SubmissionRejected {
                code: result.code,
                log: result.log,
            });
        }

        let used = *nonce;
        *nonce = next;
        tracing::debug!("Tx {} accepted with nonce {}", result.hash, used);

        Ok(SubmitReceipt {
            tx_hash: result.hash,
            nonce: used,
            code: result.code,
        })
    }

    async fn sign_and_broadcast(
        &self,
        nonce: u32,
        actions: Vec<Action>,
    ) -> Result<BroadcastResult, SubmitError> {
        let signed = UnsignedTransaction { nonce, actions }.sign(&self.signing_key)?;
        self.client.broadcast_tx_sync(&signed).await
    }
}

/// Nonce following `nonce`; an account at `u32::MAX` cannot submit again
fn next_nonce(nonce: u32) -> Result<u32, SubmitError> {
    nonce.checked_add(1).ok_or(SubmitError::NonceExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::SignedTransaction;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted sequencer: replies with queued codes (0 once exhausted)
    #[derive(Default)]
    struct MockSequencer {
        codes: SyncMutex<VecDeque<u32>>,
        broadcasts: SyncMutex<Vec<SignedTransaction>>,
        remote_nonce: u32,
        nonce_queries: AtomicUsize,
        fail_broadcast: bool,
    }

    impl MockSequencer {
        fn with_codes(codes: &[u32], remote_nonce: u32) -> Self {
            Self {
                codes: SyncMutex::new(codes.iter().copied().collect()),
                remote_nonce,
                ..Default::default()
            }
        }

        fn broadcast_nonces(&self) -> Vec<u32> {
            self.broadcasts.lock().iter().map(|tx| tx.transaction.nonce).collect()
        }
    }

    #[async_trait]
    impl SequencerClient for MockSequencer {
        async fn broadcast_tx_sync(&self, tx: &SignedTransaction) -> Result<BroadcastResult, SubmitError> {
            if self.fail_broadcast {
                return Err(SubmitError::Transport("connection refused".to_string()));
            }
            self.broadcasts.lock().push(tx.clone());
            let code = self.codes.lock().pop_front().unwrap_or(0);
            Ok(BroadcastResult {
                code,
                log: String::new(),
                hash: format!("tx-{}", tx.transaction.nonce),
            })
        }

        async fn get_nonce(&self, _address: &Address) -> Result<u32, SubmitError> {
            self.nonce_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote_nonce)
        }
    }

    fn submitter(mock: Arc<MockSequencer>, nonce: u32) -> SequencerSubmitter {
        SequencerSubmitter::new(mock, SigningKey::from_bytes(&[11u8; 32]), [2u8; 32]).with_nonce(nonce)
    }

    #[tokio::test]
    async fn test_accepted_submission_advances_nonce() {
        let mock = Arc::new(MockSequencer::default());
        let submitter = submitter(mock.clone(), 5);

        let receipt = submitter.submit(b"hello".to_vec()).await.unwrap();

        assert_eq!(receipt.nonce, 5);
        assert_eq!(submitter.cached_nonce().await, 6);
        assert_eq!(mock.broadcast_nonces(), vec![5]);
        assert_eq!(mock.nonce_queries.load(Ordering::SeqCst), 0);

        let tx = &mock.broadcasts.lock()[0];
        assert!(tx.verify());
        assert_eq!(
            tx.transaction.actions,
            vec![Action::Sequence(SequenceAction {
                rollup_id: [2u8; 32],
                data: b"hello".to_vec(),
            })]
        );
    }

    #[tokio::test]
    async fn test_nonce_conflict_retries_once_with_remote_nonce() {
        let mock = Arc::new(MockSequencer::with_codes(&[NONCE_CONFLICT_CODE], 9));
        let submitter = submitter(mock.clone(), 5);

        let receipt = submitter.submit(b"hello".to_vec()).await.unwrap();

        assert_eq!(receipt.nonce, 9);
        assert_eq!(submitter.cached_nonce().await, 10);
        assert_eq!(mock.broadcast_nonces(), vec![5, 9]);
        assert_eq!(mock.nonce_queries.load(Ordering::SeqCst), 1);

        let broadcasts = mock.broadcasts.lock();
        assert_eq!(broadcasts[0].transaction.actions, broadcasts[1].transaction.actions);
    }

    #[tokio::test]
    async fn test_second_conflict_is_fatal() {
        let mock = Arc::new(MockSequencer::with_codes(
            &[NONCE_CONFLICT_CODE, NONCE_CONFLICT_CODE],
            9,
        ));
        let submitter = submitter(mock.clone(), 5);

        let err = submitter.submit(b"hello".to_vec()).await.unwrap_err();

        assert_eq!(err, SubmitError::NonceConflict { nonce: 9 });
        assert_eq!(mock.broadcast_nonces(), vec![5, 9]);
        assert_eq!(submitter.cached_nonce().await, 9);
    }

    #[tokio::test]
    async fn test_other_rejection_code_surfaces() {
        let mock = Arc::new(MockSequencer::with_codes(&[7], 0));
        let submitter = submitter(mock.clone(), 3);

        let err = submitter.submit(b"hello".to_vec()).await.unwrap_err();

        assert!(matches!(err, SubmitError::SubmissionRejected { code: 7, .. }));
        assert_eq!(submitter.cached_nonce().await, 3);
        assert_eq!(mock.broadcast_nonces(), vec![3]);
    }

    #[tokio::test]
    async fn test_transport_error_leaves_nonce() {
        let mock = Arc::new(MockSequencer {
            fail_broadcast: true,
            ..Default::default()
        });
        let submitter = submitter(mock, 4);

        let err = submitter.submit(b"hello".to_vec()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Transport(_)));
        assert_eq!(submitter.cached_nonce().await, 4);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_use_distinct_nonces() {
        let mock = Arc::new(MockSequencer::default());
        let submitter = Arc::new(submitter(mock.clone(), 0));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let submitter = submitter.clone();
                tokio::spawn(async move { submitter.submit(format!("m{}", i).into_bytes()).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut nonces = mock.broadcast_nonces();
        nonces.sort_unstable();
        assert_eq!(nonces, (0..16).collect::<Vec<u32>>());
        assert_eq!(submitter.cached_nonce().await, 16);
    }

    #[tokio::test]
    async fn test_exhausted_nonce_is_not_broadcast() {
        let mock = Arc::new(MockSequencer::default());
        let submitter = submitter(mock.clone(), u32::MAX);

        let err = submitter.submit(b"hello".to_vec()).await.unwrap_err();
        assert_eq!(err, SubmitError::NonceExhausted);
        assert!(mock.broadcast_nonces().is_empty());
        assert_eq!(submitter.cached_nonce().await, u32::MAX);
    }

    #[tokio::test]
    async fn test_exhausted_remote_nonce_stops_retry() {
        let mock = Arc::new(MockSequencer::with_codes(&[NONCE_CONFLICT_CODE], u32::MAX));
        let submitter = submitter(mock.clone(), 5);

        let err = submitter.submit(b"hello".to_vec()).await.unwrap_err();
        assert_eq!(err, SubmitError::NonceExhausted);
        assert_eq!(mock.broadcast_nonces(), vec![5]);
        assert_eq!(submitter.cached_nonce().await, u32::MAX);
    }
}
