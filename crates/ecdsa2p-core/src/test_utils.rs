//! Shared fixtures for unit tests

use crate::keygen::{KeyAgreement, KeyShareCommit};
use crate::mpc::{async_trait, MemoryRelay, Relay};
use crate::paillier::DecryptionKey;
use crate::sign::{AgreedNonce, FinalSignature, NonceAgreement, Party1Signer, Party2Signer};
use crate::{
    new_session_id, KeyShare, KeySplit, MessageHash, PartyId, Result, SessionId, Signature,
};
use k256::Scalar;
use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Mutex;

const FIXTURE_P: &str = "f66226b26abf592e57c1f61347886ac910f030357756a37fbf10b239dd62bc3d\
                         817fe77a4a138f250e2059a375b6da8b396110385fe925b50ab8d2774bc8d893";
const FIXTURE_Q: &str = "cbcc36f003ce68eb3c310890f6170ddcd9146dcb3550d142890eb7b961ccc45f\
                         0ba1d1f8053bba0bef3da5251763faf184e29c4236fff8b795898f5172327657";

/// 1024-bit Paillier key from two fixed 512-bit primes.
///
/// Large enough for the signature-share plaintexts (which stay below 2^769)
/// and cheap enough to use in loops.
pub(crate) fn paillier_fixture() -> DecryptionKey {
    let p = BigUint::parse_bytes(FIXTURE_P.as_bytes(), 16).unwrap();
    let q = BigUint::parse_bytes(FIXTURE_Q.as_bytes(), 16).unwrap();
    DecryptionKey::from_primes(p, q).unwrap()
}

/// Deterministic RNG for reproducible tests
pub(crate) fn seeded_rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Parse a 32-byte big-endian hex constant
pub(crate) fn bytes32(hex_str: &str) -> [u8; 32] {
    hex::decode(hex_str).unwrap().try_into().unwrap()
}

/// Run both sides of a key agreement in memory
pub(crate) fn key_agreement_pair<R: RngCore + CryptoRng>(rng: &mut R) -> (KeyShare, KeyShare) {
    split_key_agreement(KeySplit::Multiplicative, rng)
}

/// Run both sides of a key agreement with the given split
pub(crate) fn split_key_agreement<R: RngCore + CryptoRng>(
    split: KeySplit,
    rng: &mut R,
) -> (KeyShare, KeyShare) {
    let session_id = new_session_id(rng);
    let (a, commit_a) = KeyAgreement::new(PartyId::Party1, session_id, split, rng).unwrap();
    let (b, commit_b) = KeyAgreement::new(PartyId::Party2, session_id, split, rng).unwrap();
    complete_key_agreement(a, commit_a, b, commit_b)
}

/// Run a key agreement over fixed shares
pub(crate) fn key_agreement_with_shares<R: RngCore + CryptoRng>(
    x1: Scalar,
    x2: Scalar,
    rng: &mut R,
) -> (KeyShare, KeyShare) {
    let session_id = new_session_id(rng);
    let split = KeySplit::Multiplicative;
    let (a, commit_a) =
        KeyAgreement::with_share(PartyId::Party1, session_id, split, x1, rng).unwrap();
    let (b, commit_b) =
        KeyAgreement::with_share(PartyId::Party2, session_id, split, x2, rng).unwrap();
    complete_key_agreement(a, commit_a, b, commit_b)
}

fn complete_key_agreement(
    mut a: KeyAgreement,
    commit_a: KeyShareCommit,
    mut b: KeyAgreement,
    commit_b: KeyShareCommit,
) -> (KeyShare, KeyShare) {
    let reveal_a = a.receive_commit(&commit_b).unwrap();
    let reveal_b = b.receive_commit(&commit_a).unwrap();
    let confirm_a = a.receive_reveal(&reveal_b).unwrap();
    let confirm_b = b.receive_reveal(&reveal_a).unwrap();
    (
        a.receive_confirm(&confirm_b).unwrap(),
        b.receive_confirm(&confirm_a).unwrap(),
    )
}

/// Set up both signers over the fixture Paillier key
pub(crate) fn signer_pair<R: RngCore + CryptoRng>(
    key_shares: (KeyShare, KeyShare),
    rng: &mut R,
) -> (Party1Signer, Party2Signer) {
    let (share1, share2) = key_shares;
    let (signer1, setup) =
        Party1Signer::new(share1, paillier_fixture(), new_session_id(rng), rng).unwrap();
    let signer2 = Party2Signer::new(share2, &setup).unwrap();
    (signer1, signer2)
}

/// Run a nonce agreement in memory, optionally with fixed ephemeral shares
pub(crate) fn agree_nonces<R: RngCore + CryptoRng>(
    session_id: SessionId,
    attempt: u32,
    fixed: Option<(Scalar, Scalar)>,
    rng: &mut R,
) -> Result<(AgreedNonce, AgreedNonce)> {
    let ((mut a, commit_a), (mut b, commit_b)) = match fixed {
        Some((k1, k2)) => (
            NonceAgreement::with_nonce(PartyId::Party1, session_id, attempt, k1, rng)?,
            NonceAgreement::with_nonce(PartyId::Party2, session_id, attempt, k2, rng)?,
        ),
        None => (
            NonceAgreement::new(PartyId::Party1, session_id, attempt, rng)?,
            NonceAgreement::new(PartyId::Party2, session_id, attempt, rng)?,
        ),
    };
    let reveal_a = a.receive_commit(&commit_b)?;
    let reveal_b = b.receive_commit(&commit_a)?;
    let confirm_a = a.receive_reveal(&reveal_b)?;
    let confirm_b = b.receive_reveal(&reveal_a)?;
    Ok((a.receive_confirm(&confirm_b)?, b.receive_confirm(&confirm_a)?))
}

/// One full signing attempt without a relay
pub(crate) fn sign_locally<R: RngCore + CryptoRng>(
    signer1: &Party1Signer,
    signer2: &Party2Signer,
    hash: &MessageHash,
    rng: &mut R,
) -> Result<Signature> {
    let session_id = new_session_id(rng);
    let (nonce1, nonce2) = agree_nonces(session_id, 0, None, rng)?;
    let share = signer2.compute_share(&nonce2, hash, rng)?;
    let signature = signer1.finalize(&nonce1, hash, &share)?;
    let final_signature = FinalSignature {
        session_id,
        attempt: 0,
        signature,
    };
    signer2.check_signature(&nonce2, hash, &final_signature)
}

type Tamper = dyn Fn(u32, PartyId, &mut Value) + Send + Sync;

/// Relay that records every message and lets a test rewrite it in transit
pub(crate) struct TamperingRelay {
    inner: MemoryRelay,
    tamper: Box<Tamper>,
    sent: Mutex<Vec<(u32, PartyId, Value)>>,
}

impl TamperingRelay {
    pub(crate) fn new(tamper: impl Fn(u32, PartyId, &mut Value) + Send + Sync + 'static) -> Self {
        Self {
            inner: MemoryRelay::new(),
            tamper: Box::new(tamper),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages as their senders produced them, before tampering
    pub(crate) fn sent(&self) -> Vec<(u32, PartyId, Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn pending(&self) -> usize {
        self.inner.pending()
    }
}

#[async_trait]
impl Relay for TamperingRelay {
    async fn send<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()> {
        let mut value = serde_json::to_value(message)?;
        self.sent.lock().unwrap().push((round, to, value.clone()));
        (self.tamper)(round, to, &mut value);
        self.inner.send(session_id, round, to, &value).await
    }

    async fn receive<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        me: PartyId,
    ) -> Result<T> {
        self.inner.receive(session_id, round, me).await
    }

    async fn close_session(&self, session_id: &SessionId, me: PartyId) -> Result<usize> {
        self.inner.close_session(session_id, me).await
    }
}
