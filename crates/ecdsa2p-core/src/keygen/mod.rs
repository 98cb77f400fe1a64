//! Two-party key agreement
//!
//! Each party samples a share `x_i`, commits to `x_i * G`, reveals, and
//! derives `H = x_i * (x_j * G)`, or `H = x_i * G + x_j * G` under an
//! additive split. A final confirm round cross-checks `H`.
//! Party1's share is drawn from `[n/3, 2n/3)`, a precondition of the range
//! argument that a malicious-secure version would attach to `Enc(x1)`.

mod messages;
mod protocol;

pub use messages::*;
pub use protocol::run_key_agreement;

use crate::exchange::PointExchange;
use crate::types::{biguint_to_scalar, curve_order, scalar_to_biguint};
use crate::{
    Error, KeyShare, KeySplit, PartyId, PointBytes, Result, SecretScalar, SessionId, SigningKey,
};
use k256::{NonZeroScalar, ProjectivePoint, Scalar};
use num_bigint::{BigUint, RandBigInt};
use rand_core::{CryptoRng, RngCore};

/// Bounds `[n/3, 2n/3)` for Party1's key share
pub fn party1_share_range() -> (BigUint, BigUint) {
    let n = curve_order();
    (&n / 3u32, (&n * 2u32) / 3u32)
}

/// Whether `share` is an acceptable Party1 key share
pub fn is_valid_party1_share(share: &Scalar) -> bool {
    let (low, high) = party1_share_range();
    let value = scalar_to_biguint(share);
    value >= low && value < high
}

/// Sample a key share for `party`
fn sample_share<R: RngCore + CryptoRng>(party: PartyId, rng: &mut R) -> Scalar {
    match party {
        PartyId::Party1 => {
            let split = KeySplit::Multiplicative;
        let (low, high) = party1_share_range();
            biguint_to_scalar(&rng.gen_biguint_range(&low, &high))
        }
        PartyId::Party2 => *NonZeroScalar::random(rng),
    }
}

/// One party's key agreement state machine.
///
/// Driven by [`run_key_agreement`] over a relay, or message by message:
/// `new` → `receive_commit` → `receive_reveal` → `receive_confirm`.
pub struct KeyAgreement {
    party: PartyId,
    session_id: SessionId,
    split: KeySplit,
    exchange: PointExchange,
    public_key: Option<ProjectivePoint>,
}

impl KeyAgreement {
    /// Sample a fresh share and commit to it
    pub fn new<R: RngCore + CryptoRng>(
        party: PartyId,
        session_id: SessionId,
        split: KeySplit,
        rng: &mut R,
    ) -> Result<(Self, KeyShareCommit)> {
        let share = sample_share(party, rng);
        Self::with_share(party, session_id, split, share, rng)
    }

    /// Commit to a caller-chosen share
    pub fn with_share<R: RngCore + CryptoRng>(
        party: PartyId,
        session_id: SessionId,
        split: KeySplit,
        share: Scalar,
        rng: &mut R,
    ) -> Result<(Self, KeyShareCommit)> {
        let share = SecretScalar::new(share);
        if bool::from(share.expose().is_zero()) {
            return Err(Error::RangeViolation("key share is zero".into()));
        }
        if party == PartyId::Party1 && !is_valid_party1_share(share.expose()) {
            return Err(Error::RangeViolation(
                "party 1 key share is outside [n/3, 2n/3)".into(),
            ));
        }

        let exchange = PointExchange::start(party, share, rng)?;
        let commit = KeyShareCommit {
            party_id: party,
            session_id,
            key_split: split,
            digest: exchange.digest(),
        };

        Ok((
            Self {
                party,
                session_id,
                split,
                exchange,
                public_key: None,
            },
            commit,
        ))
    }

    pub fn party(&self) -> PartyId {
        self.party
    }

    pub fn key_split(&self) -> KeySplit {
        self.split
    }

    /// Record the peer's commitment and reveal our public share
    pub fn receive_commit(&mut self, msg: &KeyShareCommit) -> Result<KeyShareReveal> {
        self.check_session(&msg.session_id)?;
        if msg.key_split != self.split {
            return Err(Error::ProtocolViolation(format!(
                "{} proposes a {} key split, {} expects {}",
                msg.party_id, msg.key_split, self.party, self.split
            )));
        }
        let opening = self.exchange.receive_commitment(msg.party_id, msg.digest)?;

        Ok(KeyShareReveal {
            party_id: self.party,
            session_id: self.session_id,
            randomizer: opening.randomizer,
            public_share: opening.point,
        })
    }

    /// Verify the peer's reveal and derive the joint public key
    pub fn receive_reveal(&mut self, msg: &KeyShareReveal) -> Result<KeyConfirm> {
        self.check_session(&msg.session_id)?;
        let peer_share =
            self.exchange
                .receive_reveal(msg.party_id, &msg.randomizer, &msg.public_share)?;
        let public_key = self
            .split
            .joint_public_key(self.exchange.secret(), &peer_share);

        let confirm = KeyConfirm {
            party_id: self.party,
            session_id: self.session_id,
            public_key: PointBytes::encode(&public_key)?,
        };
        self.public_key = Some(public_key);
        Ok(confirm)
    }

    /// Compare the peer's joint public key with ours and finish
    pub fn receive_confirm(self, msg: &KeyConfirm) -> Result<KeyShare> {
        self.check_session(&msg.session_id)?;
        if msg.party_id != self.party.peer() {
            return Err(Error::ProtocolViolation(format!(
                "key confirmation from {} received by {}",
                msg.party_id, self.party
            )));
        }
        let public_key = self
            .public_key
            .ok_or_else(|| Error::ProtocolViolation("key confirmation before reveal".into()))?;

        if msg.public_key.decode()? != public_key {
            return Err(Error::KeyAgreementInconsistent);
        }

        let (secret, own_share, peer_share) = self.exchange.finish()?;
        let signing_key = match self.party {
            PartyId::Party1 => SigningKey::new(self.split, own_share, peer_share, public_key),
            PartyId::Party2 => SigningKey::new(self.split, peer_share, own_share, public_key),
        };
        Ok(KeyShare::new(self.party, secret, signing_key))
    }

    fn check_session(&self, session_id: &SessionId) -> Result<()> {
        if session_id != &self.session_id {
            return Err(Error::ProtocolViolation(
                "message belongs to a different key agreement session".into(),
            ));
        }
        Ok(())
    }
}
