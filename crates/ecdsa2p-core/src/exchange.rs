//! Commit/reveal exchange of one secret scalar's public point
//!
//! Shared by key agreement and nonce agreement. Each party commits to
//! `secret * G`, and the opening is only released once the commitment book
//! holds exactly one digest per party.

use crate::commitment::{self, Commitment, Digest, Opening, Randomizer};
use crate::{Error, PartyId, PointBytes, Result, SecretScalar};
use k256::{elliptic_curve::Group, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use tracing::error;
use zeroize::Zeroizing;

/// Commitments collected during one phase, keyed by party
#[derive(Debug, Default)]
pub(crate) struct CommitmentBook {
    entries: BTreeMap<PartyId, Digest>,
}

impl CommitmentBook {
    pub(crate) fn insert(&mut self, party: PartyId, digest: Digest) -> Result<()> {
        if self.entries.contains_key(&party) {
            return Err(Error::ProtocolViolation(format!(
                "second commitment from {} in the same phase",
                party
            )));
        }
        self.entries.insert(party, digest);
        Ok(())
    }

    pub(crate) fn get(&self, party: PartyId) -> Option<&Digest> {
        self.entries.get(&party)
    }

    /// Both parties have committed
    pub(crate) fn is_complete(&self) -> bool {
        self.get(PartyId::Party1).is_some() && self.get(PartyId::Party2).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExchangeState {
    AwaitingCommitment,
    AwaitingReveal,
    Verified,
    Aborted,
}

/// One party's side of a commit/reveal exchange
pub(crate) struct PointExchange {
    party: PartyId,
    secret: SecretScalar,
    own_point: ProjectivePoint,
    digest: Digest,
    opening: Zeroizing<Opening>,
    book: CommitmentBook,
    peer_point: Option<ProjectivePoint>,
    state: ExchangeState,
}

impl PointExchange {
    /// Commit to `secret * G` under a fresh randomizer
    pub(crate) fn start<R: RngCore + CryptoRng>(
        party: PartyId,
        secret: SecretScalar,
        rng: &mut R,
    ) -> Result<Self> {
        let own_point = ProjectivePoint::GENERATOR * secret.expose();
        let Commitment { digest, opening } = Commitment::new(rng, &own_point)?;

        let mut book = CommitmentBook::default();
        book.insert(party, digest)?;

        Ok(Self {
            party,
            secret,
            own_point,
            digest,
            opening: Zeroizing::new(opening),
            book,
            peer_point: None,
            state: ExchangeState::AwaitingCommitment,
        })
    }

    pub(crate) fn digest(&self) -> Digest {
        self.digest
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ExchangeState {
        self.state
    }

    /// Record the peer's commitment and release our own opening.
    ///
    /// The opening is only handed out once the book is complete.
    pub(crate) fn receive_commitment(&mut self, from: PartyId, digest: Digest) -> Result<Opening> {
        self.expect_peer(from)?;
        if self.state != ExchangeState::AwaitingCommitment {
            return Err(Error::ProtocolViolation(format!(
                "unexpected commitment from {} in state {:?}",
                from, self.state
            )));
        }

        self.book.insert(from, digest)?;
        if !self.book.is_complete() {
            return Err(Error::Internal("commitment book incomplete".into()));
        }

        self.state = ExchangeState::AwaitingReveal;
        Ok((*self.opening).clone())
    }

    /// Check the peer's opening against its commitment and keep its point
    pub(crate) fn receive_reveal(
        &mut self,
        from: PartyId,
        randomizer: &Randomizer,
        point: &PointBytes,
    ) -> Result<ProjectivePoint> {
        self.expect_peer(from)?;
        if self.state != ExchangeState::AwaitingReveal {
            return Err(Error::ProtocolViolation(format!(
                "unexpected reveal from {} in state {:?}",
                from, self.state
            )));
        }

        let digest = self
            .book
            .get(from)
            .ok_or_else(|| Error::Internal("missing peer commitment".into()))?;
        if !commitment::open_and_verify(digest, randomizer, point) {
            error!(party = %self.party, peer = %from, "reveal does not match commitment");
            self.state = ExchangeState::Aborted;
            return Err(Error::CommitmentMismatch { party: from });
        }

        let peer_point = match point.decode() {
            Ok(p) if !bool::from(p.is_identity()) => p,
            Ok(_) => {
                self.state = ExchangeState::Aborted;
                return Err(Error::ProtocolViolation("peer revealed the identity".into()));
            }
            Err(e) => {
                self.state = ExchangeState::Aborted;
                return Err(e);
            }
        };

        self.peer_point = Some(peer_point);
        self.state = ExchangeState::Verified;
        Ok(peer_point)
    }

    pub(crate) fn secret(&self) -> &Scalar {
        self.secret.expose()
    }

    #[cfg(test)]
    pub(crate) fn own_point(&self) -> &ProjectivePoint {
        &self.own_point
    }

    /// Consume a verified exchange into (secret, own point, peer point)
    pub(crate) fn finish(self) -> Result<(SecretScalar, ProjectivePoint, ProjectivePoint)> {
        match (self.state, self.peer_point) {
            (ExchangeState::Verified, Some(peer_point)) => {
                Ok((self.secret, self.own_point, peer_point))
            }
            (state, _) => Err(Error::ProtocolViolation(format!(
                "exchange not verified (state {:?})",
                state
            ))),
        }
    }

    fn expect_peer(&self, from: PartyId) -> Result<()> {
        if from != self.party.peer() {
            return Err(Error::ProtocolViolation(format!(
                "{} received a message claiming to be from {}",
                self.party, from
            )));
        }
        Ok(())
    }
}
