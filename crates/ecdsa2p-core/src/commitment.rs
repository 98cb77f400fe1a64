//! Hash commitments to curve points
//!
//! `digest = Keccak256(randomizer || BE32(x) || BE32(y))`. Binding rests on
//! the preimage resistance of Keccak-256; hiding on the 256-bit randomizer,
//! which must be fresh for every commitment.

use crate::{PointBytes, Result};
use k256::ProjectivePoint;
use rand_core::{CryptoRng, RngCore};
use sha3::{Digest as _, Keccak256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Randomizer length in bytes
pub const RANDOMIZER_LEN: usize = 32;

/// Commitment digest
pub type Digest = [u8; 32];

/// Randomizer mixed into a commitment
pub type Randomizer = [u8; RANDOMIZER_LEN];

/// What the committer later reveals
#[derive(Debug, Clone, Zeroize)]
pub struct Opening {
    pub randomizer: Randomizer,
    #[zeroize(skip)]
    pub point: PointBytes,
}

/// A commitment together with its opening
#[derive(Debug, Clone)]
pub struct Commitment {
    pub digest: Digest,
    pub opening: Opening,
}

impl Commitment {
    /// Commit to `point` under a fresh randomizer drawn from `rng`
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, point: &ProjectivePoint) -> Result<Self> {
        let mut randomizer = [0u8; RANDOMIZER_LEN];
        rng.fill_bytes(&mut randomizer);
        let point = PointBytes::encode(point)?;
        Ok(Self {
            digest: commit(&randomizer, &point),
            opening: Opening { randomizer, point },
        })
    }
}

/// Hash a randomizer and point into a commitment digest
pub fn commit(randomizer: &Randomizer, point: &PointBytes) -> Digest {
    let mut hasher = Keccak256::new();
    hasher.update(randomizer);
    hasher.update(point.x);
    hasher.update(point.y);
    hasher.finalize().into()
}

/// Recompute the digest for an opening and compare in constant time
pub fn open_and_verify(digest: &Digest, randomizer: &Randomizer, point: &PointBytes) -> bool {
    commit(randomizer, point).ct_eq(digest).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::{elliptic_curve::Field, Scalar};
    use rand::rngs::OsRng;
    use sha3::Digest as _;

    fn random_commitment() -> Commitment {
        let point = ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng);
        Commitment::new(&mut OsRng, &point).unwrap()
    }

    #[test]
    fn test_open_and_verify_accepts_exact_opening() {
        let c = random_commitment();
        assert!(open_and_verify(&c.digest, &c.opening.randomizer, &c.opening.point));
    }

    #[test]
    fn test_any_bit_flip_fails() {
        let c = random_commitment();

        for byte in 0..RANDOMIZER_LEN {
            for bit in 0..8 {
                let mut randomizer = c.opening.randomizer;
                randomizer[byte] ^= 1 << bit;
                assert!(!open_and_verify(&c.digest, &randomizer, &c.opening.point));
            }
        }

        for byte in 0..32 {
            for bit in 0..8 {
                let mut point = c.opening.point;
                point.x[byte] ^= 1 << bit;
                assert!(!open_and_verify(&c.digest, &c.opening.randomizer, &point));

                let mut point = c.opening.point;
                point.y[byte] ^= 1 << bit;
                assert!(!open_and_verify(&c.digest, &c.opening.randomizer, &point));
            }
        }
    }

    #[test]
    fn test_digest_flip_fails() {
        let c = random_commitment();
        let mut digest = c.digest;
        digest[0] ^= 0x80;
        assert!(!open_and_verify(&digest, &c.opening.randomizer, &c.opening.point));
    }

    #[test]
    fn test_fresh_randomizer_per_commitment() {
        let point = ProjectivePoint::GENERATOR;
        let a = Commitment::new(&mut OsRng, &point).unwrap();
        let b = Commitment::new(&mut OsRng, &point).unwrap();
        assert_ne!(a.opening.randomizer, b.opening.randomizer);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_known_digest_layout() {
        // Keccak256 over 32 zero bytes followed by the generator coordinates
        let point = PointBytes::encode(&ProjectivePoint::GENERATOR).unwrap();
        let mut preimage = Vec::with_capacity(96);
        preimage.extend_from_slice(&[0u8; 32]);
        preimage.extend_from_slice(&point.x);
        preimage.extend_from_slice(&point.y);
        let expected: Digest = Keccak256::digest(&preimage).into();
        assert_eq!(commit(&[0u8; 32], &point), expected);
    }

    #[test]
    fn test_identity_cannot_be_committed() {
        assert!(Commitment::new(&mut OsRng, &ProjectivePoint::IDENTITY).is_err());
    }
}
