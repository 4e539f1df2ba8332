//! Sequencer transaction types

use crate::error::SubmitError;
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Rollup identifier on the sequencing layer
pub type RollupId = [u8; 32];

/// Sequencer account address
pub type Address = [u8; 20];

/// Derive the rollup identifier from the rollup name
pub fn rollup_id_from_name(name: &str) -> RollupId {
    Sha256::digest(name.as_bytes()).into()
}

/// Derive an account address from its verifying key
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let digest = Sha256::digest(key.as_bytes());
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[..20]);
    address
}

/// Payload destined for one rollup
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SequenceAction {
    pub rollup_id: RollupId,
    pub data: Vec<u8>,
}

/// Action carried by a sequencer transaction
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    Sequence(SequenceAction),
}

/// Transaction body covered by the signature
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UnsignedTransaction {
    pub nonce: u32,
    pub actions: Vec<Action>,
}

impl UnsignedTransaction {
    /// Deterministic encoding used for signing
    pub fn to_bytes(&self) -> Result<Vec<u8>, SubmitError> {
        borsh::to_vec(self).map_err(|e| SubmitError::Encoding(e.to_string()))
    }

    /// Sign with the sequencer account key
    pub fn sign(self, key: &SigningKey) -> Result<SignedTransaction, SubmitError> {
        let signature = key.sign(&self.to_bytes()?);
        Ok(SignedTransaction {
            signature: signature.to_bytes(),
            public_key: key.verifying_key().to_bytes(),
            transaction: self,
        })
    }
}

/// Signed transaction as broadcast to the sequencer
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    pub signature: [u8; 64],
    pub public_key: [u8; 32],
    pub transaction: UnsignedTransaction,
}

impl SignedTransaction {
    /// Serialize for network transmission
    pub fn to_bytes(&self) -> Result<Vec<u8>, SubmitError> {
        borsh::to_vec(self).map_err(|e| SubmitError::Encoding(e.to_string()))
    }

    /// Deserialize from network
    pub fn from_bytes(data: &[u8]) -> Result<Self, SubmitError> {
        borsh::from_slice(data).map_err(|e| SubmitError::Encoding(e.to_string()))
    }

    /// Check the signature against the embedded public key
    pub fn verify(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return false;
        };
        let Ok(message) = self.transaction.to_bytes() else {
            return false;
        };
        key.verify(&message, &Signature::from_bytes(&self.signature)).is_ok()
    }
}
