//! Key agreement message types

use crate::commitment::{Digest, Randomizer};
use crate::{KeySplit, PartyId, PointBytes, SessionId};
use serde::{Deserialize, Serialize};

/// Round 1 message: commitment to the public key share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareCommit {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    /// Key split the sender intends to use
    #[serde(default)]
    pub key_split: KeySplit,
    /// Keccak-256 commitment digest
    pub digest: Digest,
}

/// Round 2 message: opening of the round 1 commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareReveal {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub randomizer: Randomizer,
    /// `x_i * G`
    pub public_share: PointBytes,
}

/// Round 3 message: the joint public key as derived by the sender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfirm {
    /// Sender party ID
    pub party_id: PartyId,
    pub session_id: SessionId,
    pub public_key: PointBytes,
}
