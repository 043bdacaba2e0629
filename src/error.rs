//! Error types for the verification client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API key not configured - set PHALA_API_KEY")]
    MissingApiKey,

    #[error("Canonical JSON error: {0}")]
    Canonical(String),

    #[error("Malformed hash pair: {0}")]
    MalformedHashPair(String),

    #[error("Verification fault: {0}")]
    Verification(String),
}

/// Reasons a personal-sign signature cannot be turned back into an address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature does not recover to a valid public key: {0}")]
    Unrecoverable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
