//! ECDSA verification against the joint public key
//!
//! Everything here uses public information only, so any third party can
//! check a two-party signature.

use crate::types::{reduce_bytes, scalar_from_bytes};
use crate::{Error, Result, Signature};
use k256::{
    ecdsa::{self, RecoveryId},
    elliptic_curve::{point::AffineCoordinates, sec1::ToEncodedPoint},
    ProjectivePoint, Scalar,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// 32-byte message digest that gets signed
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHash([u8; 32]);

impl MessageHash {
    /// Keccak-256 of the message
    pub fn from_message(message: &[u8]) -> Self {
        Self(Keccak256::digest(message).into())
    }

    /// Use a digest computed elsewhere
    pub fn from_prehashed(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The digest as an integer reduced mod n
    pub fn to_scalar(&self) -> Scalar {
        reduce_bytes(&self.0)
    }
}

impl fmt::Debug for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHash({})", hex::encode(self.0))
    }
}

/// Verify `signature` over `hash` under `public_key`
pub fn verify(signature: &Signature, hash: &MessageHash, public_key: &ProjectivePoint) -> bool {
    match (signature.r_scalar(), signature.s_scalar()) {
        (Ok(r), Ok(s)) => verify_scalars(&r, &s, &hash.to_scalar(), public_key),
        _ => false,
    }
}

/// Plain ECDSA check: `(z * s^-1 * G + r * s^-1 * H).x mod n == r`.
///
/// Rejects `r` or `s` equal to zero.
pub fn verify_scalars(r: &Scalar, s: &Scalar, z: &Scalar, public_key: &ProjectivePoint) -> bool {
    if bool::from(r.is_zero()) || bool::from(s.is_zero()) {
        return false;
    }
    let s_inv: Scalar = match Option::from(s.invert()) {
        Some(inv) => inv,
        None => return false,
    };

    let u1 = z * &s_inv;
    let u2 = r * &s_inv;
    let point = ProjectivePoint::GENERATOR * u1 + public_key * &u2;
    if point == ProjectivePoint::IDENTITY {
        return false;
    }

    x_coordinate_mod_n(&point) == *r
}

/// The x-coordinate of a point reduced mod n
pub fn x_coordinate_mod_n(point: &ProjectivePoint) -> Scalar {
    reduce_bytes(&point.to_affine().x().into())
}

/// Recovery id for a signature whose nonce point is `nonce_point`.
///
/// Bit 0 is the parity of y, flipped when `s` was negated into low-S form;
/// bit 1 is set when the x-coordinate was not below n.
pub fn recovery_id(nonce_point: &ProjectivePoint, s_was_negated: bool) -> u8 {
    let affine = nonce_point.to_affine();
    let y_odd = bool::from(affine.y_is_odd()) ^ s_was_negated;
    let x_overflow = scalar_from_bytes(&affine.x().into()).is_err();
    (y_odd as u8) | ((x_overflow as u8) << 1)
}

/// Recover the public key from a signature and its recovery id
pub fn recover_public_key(signature: &Signature, hash: &MessageHash) -> Result<ProjectivePoint> {
    let sig = ecdsa::Signature::from_slice(&signature.to_bytes())
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or_else(|| Error::Crypto(format!("invalid recovery id {}", signature.recovery_id)))?;
    let key = ecdsa::VerifyingKey::recover_from_prehash(hash.as_bytes(), &sig, recovery_id)
        .map_err(|_| Error::InvalidSignature)?;
    Ok(ProjectivePoint::from(*key.as_affine()))
}

/// Decode a SEC1 public key, compressed or uncompressed
pub fn parse_public_key(bytes: &[u8]) -> Result<ProjectivePoint> {
    let key = k256::PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| Error::Deserialization("invalid SEC1 public key".into()))?;
    Ok(key.to_projective())
}

/// EIP-55 checksummed Ethereum address of a public key
pub fn ethereum_address(public_key: &ProjectivePoint) -> Result<String> {
    let encoded = public_key.to_affine().to_encoded_point(false);
    let bytes = encoded.as_bytes();
    if bytes.len() != 65 {
        return Err(Error::Crypto("public key is the point at infinity".into()));
    }

    let hash = Keccak256::digest(&bytes[1..]);
    Ok(to_checksum_address(&hash[12..]))
}

fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
