//! Submission Errors

use thiserror::Error;

/// Errors returned by the submission path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Submission rejected with code {code}: {log}")]
    SubmissionRejected { code: u32, log: String },

    #[error("Nonce conflict persisted after refreshing nonce to {nonce}")]
    NonceConflict { nonce: u32 },

    #[error("Account nonce exhausted")]
    NonceExhausted,

    #[error("Nonce query failed with code {code}: {log}")]
    NonceQuery { code: u32, log: String },

    #[error("Sequencer transport error: {0}")]
    Transport(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}
