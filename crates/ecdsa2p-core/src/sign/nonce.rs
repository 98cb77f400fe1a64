//! Per-attempt nonce agreement
//!
//! The same commit/reveal exchange as key agreement, over ephemeral shares
//! `k1, k2`. Both parties end with `R = (k1 * k2 * G).x mod n`.

use super::{NonceCommit, NonceConfirm, NonceReveal};
use crate::exchange::PointExchange;
use crate::types::scalar_from_bytes;
use crate::verify::x_coordinate_mod_n;
use crate::{Error, PartyId, Result, SecretScalar, SessionId};
use k256::{NonZeroScalar, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use std::fmt;

/// One party's nonce agreement for a single attempt
pub struct NonceAgreement {
    party: PartyId,
    session_id: SessionId,
    attempt: u32,
    exchange: PointExchange,
    candidate: Option<(Scalar, ProjectivePoint)>,
}

/// A nonce both parties agreed on.
///
/// Holds this party's ephemeral share; it is wiped when the value is
/// dropped, whichever way the attempt ends.
pub struct AgreedNonce {
    session_id: SessionId,
    attempt: u32,
    r: Scalar,
    nonce_share: SecretScalar,
    peer_point: ProjectivePoint,
    nonce_point: ProjectivePoint,
}

impl AgreedNonce {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The signature's R component
    pub fn r(&self) -> &Scalar {
        &self.r
    }

    /// The peer's ephemeral point `k_j * G`
    pub fn peer_point(&self) -> &ProjectivePoint {
        &self.peer_point
    }

    /// The joint nonce point `k1 * k2 * G`
    pub fn nonce_point(&self) -> &ProjectivePoint {
        &self.nonce_point
    }

    pub(crate) fn nonce_share(&self) -> &Scalar {
        self.nonce_share.expose()
    }
}

impl fmt::Debug for AgreedNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgreedNonce")
            .field("session_id", &hex::encode(&self.session_id[..8]))
            .field("attempt", &self.attempt)
            .field("r", &hex::encode(self.r.to_bytes()))
            .field("nonce_share", &self.nonce_share)
            .finish_non_exhaustive()
    }
}

impl NonceAgreement {
    /// Sample a fresh ephemeral share and commit to it
    pub fn new<R: RngCore + CryptoRng>(
        party: PartyId,
        session_id: SessionId,
        attempt: u32,
        rng: &mut R,
    ) -> Result<(Self, NonceCommit)> {
        let nonce = *NonZeroScalar::random(&mut *rng);
        Self::with_nonce(party, session_id, attempt, nonce, rng)
    }

    pub(crate) fn with_nonce<R: RngCore + CryptoRng>(
        party: PartyId,
        session_id: SessionId,
        attempt: u32,
        nonce: Scalar,
        rng: &mut R,
    ) -> Result<(Self, NonceCommit)> {
        let nonce = SecretScalar::new(nonce);
        if bool::from(nonce.expose().is_zero()) {
            return Err(Error::InvalidNonce("ephemeral share is zero".into()));
        }

        let exchange = PointExchange::start(party, nonce, rng)?;
        let commit = NonceCommit {
            party_id: party,
            session_id,
            attempt,
            digest: exchange.digest(),
        };

        Ok((
            Self {
                party,
                session_id,
                attempt,
                exchange,
                candidate: None,
            },
            commit,
        ))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record the peer's commitment and reveal our ephemeral point
    pub fn receive_commit(&mut self, msg: &NonceCommit) -> Result<NonceReveal> {
        self.check_attempt(&msg.session_id, msg.attempt)?;
        let opening = self.exchange.receive_commitment(msg.party_id, msg.digest)?;

        Ok(NonceReveal {
            party_id: self.party,
            session_id: self.session_id,
            attempt: self.attempt,
            randomizer: opening.randomizer,
            ephemeral_point: opening.point,
        })
    }

    /// Verify the peer's reveal and compute our `R` candidate.
    ///
    /// The candidate is returned even when it is zero so that the peer
    /// reaches the same retry decision.
    pub fn receive_reveal(&mut self, msg: &NonceReveal) -> Result<NonceConfirm> {
        self.check_attempt(&msg.session_id, msg.attempt)?;
        let peer_point =
            self.exchange
                .receive_reveal(msg.party_id, &msg.randomizer, &msg.ephemeral_point)?;

        let nonce_point = peer_point * self.exchange.secret();
        let r = x_coordinate_mod_n(&nonce_point);
        self.candidate = Some((r, nonce_point));

        Ok(NonceConfirm {
            party_id: self.party,
            session_id: self.session_id,
            attempt: self.attempt,
            r: r.to_bytes().into(),
        })
    }

    /// Check that both parties hold the same non-zero `R`
    pub fn receive_confirm(self, msg: &NonceConfirm) -> Result<AgreedNonce> {
        self.check_attempt(&msg.session_id, msg.attempt)?;
        if msg.party_id != self.party.peer() {
            return Err(Error::ProtocolViolation(format!(
                "nonce confirmation from {} received by {}",
                msg.party_id, self.party
            )));
        }
        let (r, nonce_point) = self
            .candidate
            .ok_or_else(|| Error::ProtocolViolation("nonce confirmation before reveal".into()))?;

        if bool::from(r.is_zero()) {
            return Err(Error::InvalidNonce("R is zero".into()));
        }
        match scalar_from_bytes(&msg.r) {
            Ok(peer_r) if peer_r == r => {}
            _ => return Err(Error::InvalidNonce("parties derived different R".into())),
        }

        let (nonce_share, _, peer_point) = self.exchange.finish()?;
        Ok(AgreedNonce {
            session_id: self.session_id,
            attempt: self.attempt,
            r,
            nonce_share,
            peer_point,
            nonce_point,
        })
    }

    fn check_attempt(&self, session_id: &SessionId, attempt: u32) -> Result<()> {
        if session_id != &self.session_id {
            return Err(Error::ProtocolViolation(
                "message belongs to a different signing session".into(),
            ));
        }
        if attempt != self.attempt {
            return Err(Error::ProtocolViolation(format!(
                "message for nonce attempt {} received during attempt {}",
                attempt, self.attempt
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::Field;
    use rand::rngs::OsRng;

    fn start_pair(attempt: u32) -> (NonceAgreement, NonceCommit, NonceAgreement, NonceCommit) {
        let session_id = [8u8; 32];
        let (a, ca) = NonceAgreement::new(PartyId::Party1, session_id, attempt, &mut OsRng).unwrap();
        let (b, cb) = NonceAgreement::new(PartyId::Party2, session_id, attempt, &mut OsRng).unwrap();
        (a, ca, b, cb)
    }

    #[test]
    fn test_both_parties_agree_on_r() {
        let (mut a, ca, mut b, cb) = start_pair(0);
        let ra = a.receive_commit(&cb).unwrap();
        let rb = b.receive_commit(&ca).unwrap();
        let fa = a.receive_reveal(&rb).unwrap();
        let fb = b.receive_reveal(&ra).unwrap();
        assert_eq!(fa.r, fb.r);

        let na = a.receive_confirm(&fb).unwrap();
        let nb = b.receive_confirm(&fa).unwrap();
        assert_eq!(na.r(), nb.r());
        assert_eq!(na.nonce_point(), nb.nonce_point());

        let k = *na.nonce_share() * nb.nonce_share();
        assert_eq!(na.nonce_point(), &(ProjectivePoint::GENERATOR * k));
        assert_eq!(na.peer_point(), &(ProjectivePoint::GENERATOR * nb.nonce_share()));
        assert_eq!(nb.peer_point(), &(ProjectivePoint::GENERATOR * na.nonce_share()));
        assert!(!bool::from(na.r().is_zero()));
    }

    #[test]
    fn test_disagreeing_r_is_invalid_nonce() {
        let (mut a, ca, mut b, cb) = start_pair(0);
        let ra = a.receive_commit(&cb).unwrap();
        let rb = b.receive_commit(&ca).unwrap();
        a.receive_reveal(&rb).unwrap();
        let mut fb = b.receive_reveal(&ra).unwrap();
        fb.r[31] ^= 1;

        let err = a.receive_confirm(&fb).unwrap_err();
        assert!(matches!(err, Error::InvalidNonce(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_zero_r_from_peer_is_invalid_nonce() {
        let (mut a, ca, mut b, cb) = start_pair(2);
        let ra = a.receive_commit(&cb).unwrap();
        let rb = b.receive_commit(&ca).unwrap();
        a.receive_reveal(&rb).unwrap();
        let mut fb = b.receive_reveal(&ra).unwrap();
        fb.r = [0u8; 32];

        assert!(matches!(a.receive_confirm(&fb), Err(Error::InvalidNonce(_))));
    }

    #[test]
    fn test_stale_attempt_is_rejected() {
        let (mut a, _, _, _) = start_pair(1);
        let (_, _, _, stale) = start_pair(0);
        assert!(matches!(
            a.receive_commit(&stale),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_corrupted_ephemeral_point_aborts() {
        let (mut a, ca, mut b, cb) = start_pair(0);
        a.receive_commit(&cb).unwrap();
        let mut rb = b.receive_commit(&ca).unwrap();
        let other = ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng);
        rb.ephemeral_point = crate::PointBytes::encode(&other).unwrap();

        let err = a.receive_reveal(&rb).unwrap_err();
        assert!(matches!(err, Error::CommitmentMismatch { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fresh_nonces_per_attempt() {
        let session_id = [1u8; 32];
        let (_, first) = NonceAgreement::new(PartyId::Party1, session_id, 0, &mut OsRng).unwrap();
        let (_, second) = NonceAgreement::new(PartyId::Party1, session_id, 1, &mut OsRng).unwrap();
        assert_ne!(first.digest, second.digest);
    }
}
