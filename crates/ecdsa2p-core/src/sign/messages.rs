//! Signing message types

use crate::commitment::{Digest, Randomizer};
use crate::paillier::{Ciphertext, EncryptionKey};
use crate::{MessageHash, PartyId, PointBytes, SessionId, Signature};
use serde::{Deserialize, Serialize};

/// Setup message: Party1's Paillier key and `Enc(x1)`, sent once per key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyShare {
    pub session_id: SessionId,
    pub encryption_key: EncryptionKey,
    /// Party1's key share under `encryption_key`
    pub encrypted_share: Ciphertext,
}

/// Opens a signing session: Party2 names the digest to be signed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub session_id: SessionId,
    pub message_hash: MessageHash,
}

/// Nonce round 1: commitment to the ephemeral point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceCommit {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub attempt: u32,
    pub digest: Digest,
}

/// Nonce round 2: opening of the ephemeral point commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceReveal {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub attempt: u32,
    pub randomizer: Randomizer,
    /// `k_i * G`
    pub ephemeral_point: PointBytes,
}

/// Nonce round 3: the sender's `R` candidate. Sent even when it is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfirm {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub attempt: u32,
    pub r: [u8; 32],
}

/// Nonce round 4: the sender's verdict on the peer's `R` candidate.
///
/// Exchanged in both directions, so a rejection on either side moves both
/// parties to the next attempt together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceAck {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub attempt: u32,
    pub accepted: bool,
    /// On rejection: whether the sender will start another attempt
    pub retryable: bool,
}

/// Party2's homomorphically computed signature share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureShareCiphertext {
    pub session_id: SessionId,
    pub attempt: u32,
    /// `Enc(rho * n + k2^-1 * z) ⊕ (k2^-1 * R * x2) ⊛ Enc(x1)`, or
    /// `... ⊕ (k2^-1 * R) ⊛ (Enc(x1) ⊕ Enc(x2))` for an additive split
    pub ciphertext: Ciphertext,
}

/// The finished signature as produced by Party1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSignature {
    pub session_id: SessionId,
    pub attempt: u32,
    pub signature: Signature,
}

/// Party1's answer to a signature share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignOutcome {
    Signed(FinalSignature),
    Abandoned {
        session_id: SessionId,
        attempt: u32,
        reason: String,
        /// Whether Party1 will start another nonce attempt
        retryable: bool,
    },
}

/// Party2's verdict on the final signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureAck {
    pub session_id: SessionId,
    pub attempt: u32,
    pub accepted: bool,
}
