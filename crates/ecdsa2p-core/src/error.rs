//! Error types for two-party ECDSA operations

use crate::PartyId;
use thiserror::Error;

/// Result type alias for two-party ECDSA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during protocol execution
#[derive(Debug, Error)]
pub enum Error {
    /// A revealed value does not hash to the commitment received earlier.
    /// Treated as possible equivocation by the peer; never retried.
    #[error("Commitment mismatch: reveal from {party} does not open its commitment")]
    CommitmentMismatch { party: PartyId },

    /// The two parties derived different joint public keys
    #[error("Key agreement inconsistent: joint public keys differ")]
    KeyAgreementInconsistent,

    /// The agreed nonce is unusable (R == 0 or the parties disagree on R)
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    /// The signature share could not be turned into a valid signature
    #[error("Invalid signature share: {0}")]
    SignatureShareInvalid(String),

    /// A generated secret or plaintext is outside its required range
    #[error("Range violation: {0}")]
    RangeViolation(String),

    /// The nonce retry budget was used up
    #[error("Signing failed after {attempts} nonce attempts")]
    RetriesExhausted { attempts: u32 },

    /// A message arrived that the current state does not accept
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Timeout waiting for message
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the signing driver should start a fresh nonce attempt.
    ///
    /// Only nonce and signature-share failures qualify. Everything else
    /// either points at a misbehaving peer or at a defect that a retry
    /// would not change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::InvalidNonce(_) | Error::SignatureShareInvalid(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
