//! Core types for the two-party ECDSA protocol

use crate::{Error, Result};
use k256::{
    ecdsa,
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar,
};
use num_bigint::BigUint;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Unique identifier for a key agreement or signing session
pub type SessionId = [u8; 32];

/// Generate a fresh random session identifier
pub fn new_session_id<R: RngCore + CryptoRng>(rng: &mut R) -> SessionId {
    let mut id = [0u8; 32];
    rng.fill_bytes(&mut id);
    id
}

/// The two roles of the protocol.
///
/// Party1 owns the Paillier keypair and finalizes signatures; Party2 holds
/// the message and computes the encrypted signature share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartyId {
    Party1,
    Party2,
}

impl PartyId {
    /// The other party
    pub fn peer(self) -> PartyId {
        match self {
            PartyId::Party1 => PartyId::Party2,
            PartyId::Party2 => PartyId::Party1,
        }
    }

    /// 1-based index, as used on the command line and in logs
    pub fn index(self) -> u8 {
        match self {
            PartyId::Party1 => 1,
            PartyId::Party2 => 2,
        }
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party {}", self.index())
    }
}

/// How the signing key is split between the two parties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySplit {
    /// `x = x1 * x2` and `H = x1 * (x2 * G)`
    #[default]
    Multiplicative,
    /// `x = x1 + x2` and `H = x1 * G + x2 * G`
    Additive,
}

impl KeySplit {
    /// Derive H from our secret share and the peer's public share
    pub(crate) fn joint_public_key(
        self,
        secret: &Scalar,
        peer_share: &ProjectivePoint,
    ) -> ProjectivePoint {
        match self {
            KeySplit::Multiplicative => *peer_share * secret,
            KeySplit::Additive => ProjectivePoint::GENERATOR * secret + peer_share,
        }
    }
}

impl fmt::Display for KeySplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySplit::Multiplicative => f.write_str("multiplicative"),
            KeySplit::Additive => f.write_str("additive"),
        }
    }
}

/// A secret scalar (key share or nonce share).
///
/// Not `Clone`, redacted in `Debug`, wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretScalar(Scalar);

impl SecretScalar {
    pub(crate) fn new(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub(crate) fn expose(&self) -> &Scalar {
        &self.0
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar([redacted])")
    }
}

/// A secret big integer (Paillier factor, blinding value, decrypted share).
///
/// Redacted in `Debug`. Dropping it overwrites the digits in their existing
/// allocation before the buffer is released.
pub(crate) struct SecretBigUint(BigUint);

impl SecretBigUint {
    pub(crate) fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub(crate) fn expose(&self) -> &BigUint {
        &self.0
    }
}

impl Zeroize for SecretBigUint {
    fn zeroize(&mut self) {
        // `assign_from_slice` clears and refills the same buffer, then normalizes
        let digits = ((self.0.bits() + 31) / 32) as usize;
        self.0.assign_from_slice(&vec![0u32; digits]);
    }
}

impl Drop for SecretBigUint {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SecretBigUint {}

impl fmt::Debug for SecretBigUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBigUint([redacted])")
    }
}

/// Affine point on the wire: 32-byte big-endian x and y coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBytes {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PointBytes {
    /// Encode a point. The identity has no affine coordinates and is rejected.
    pub fn encode(point: &ProjectivePoint) -> Result<Self> {
        let encoded = point.to_affine().to_encoded_point(false);
        match (encoded.x(), encoded.y()) {
            (Some(x), Some(y)) => Ok(Self {
                x: (*x).into(),
                y: (*y).into(),
            }),
            _ => Err(Error::Crypto("cannot encode the point at infinity".into())),
        }
    }

    /// Decode and check that the coordinates lie on the curve
    pub fn decode(&self) -> Result<ProjectivePoint> {
        let encoded = EncodedPoint::from_affine_coordinates(
            &FieldBytes::from(self.x),
            &FieldBytes::from(self.y),
            false,
        );
        let affine: AffinePoint = Option::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| Error::ProtocolViolation("point is not on the curve".into()))?;
        Ok(ProjectivePoint::from(affine))
    }
}

/// Parse a canonical scalar, rejecting encodings >= n
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::from(*bytes)))
        .ok_or_else(|| Error::Deserialization("scalar is not reduced mod n".into()))
}

/// Interpret 32 big-endian bytes as an integer and reduce it mod n
pub fn reduce_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(*bytes))
}

/// The group order n
pub(crate) fn curve_order() -> BigUint {
    BigUint::from_bytes_be(&(-Scalar::ONE).to_bytes()) + 1u32
}

pub(crate) fn scalar_to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_be(&scalar.to_bytes())
}

/// Reduce an arbitrary integer mod n
pub(crate) fn biguint_to_scalar(value: &BigUint) -> Scalar {
    let reduced = (value % curve_order()).to_bytes_be();
    let mut bytes = [0u8; 32];
    bytes[32 - reduced.len()..].copy_from_slice(&reduced);
    reduce_bytes(&bytes)
}

/// Public part of the shared signing key.
///
/// `public_key` is `H = x1 * x2 * G` (or `x1 * G + x2 * G` for an additive
/// split); each party derives it from its own share and the peer's public
/// share.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    split: KeySplit,
    party1_public_share: ProjectivePoint,
    party2_public_share: ProjectivePoint,
    public_key: ProjectivePoint,
}

impl SigningKey {
    pub(crate) fn new(
        split: KeySplit,
        party1_public_share: ProjectivePoint,
        party2_public_share: ProjectivePoint,
        public_key: ProjectivePoint,
    ) -> Self {
        Self {
            split,
            party1_public_share,
            party2_public_share,
            public_key,
        }
    }

    /// Joint public key H
    pub fn public_key(&self) -> &ProjectivePoint {
        &self.public_key
    }

    pub fn key_split(&self) -> KeySplit {
        self.split
    }

    /// Public share `x_i * G` of the given party
    pub fn public_share(&self, party: PartyId) -> &ProjectivePoint {
        match party {
            PartyId::Party1 => &self.party1_public_share,
            PartyId::Party2 => &self.party2_public_share,
        }
    }

    /// SEC1 compressed encoding of H
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key
            .to_affine()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// H as a `k256` verifying key
    pub fn verifying_key(&self) -> Result<ecdsa::VerifyingKey> {
        ecdsa::VerifyingKey::from_affine(self.public_key.to_affine())
            .map_err(|e| Error::Crypto(e.to_string()))
    }

    /// EIP-55 checksummed Ethereum address of H
    pub fn ethereum_address(&self) -> Result<String> {
        crate::verify::ethereum_address(&self.public_key)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("split", &self.split)
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

/// A party's long-term key material after key agreement.
///
/// The secret share never leaves this struct; it is wiped on drop.
pub struct KeyShare {
    /// This party's role
    pub party_id: PartyId,

    secret_share: SecretScalar,

    /// Public shares and joint public key
    pub signing_key: SigningKey,
}

impl KeyShare {
    pub(crate) fn new(party_id: PartyId, secret_share: SecretScalar, signing_key: SigningKey) -> Self {
        Self {
            party_id,
            secret_share,
            signing_key,
        }
    }

    pub(crate) fn secret_share(&self) -> &Scalar {
        self.secret_share.expose()
    }

    /// Joint public key H
    pub fn public_key(&self) -> &ProjectivePoint {
        self.signing_key.public_key()
    }
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("party_id", &self.party_id)
            .field("secret_share", &self.secret_share)
            .field("signing_key", &self.signing_key)
            .finish()
    }
}

/// ECDSA signature (r, s) in canonical low-S form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component
    pub r: [u8; 32],
    /// S component
    pub s: [u8; 32],
    /// Recovery ID (0..=3)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    pub(crate) fn from_scalars(r: &Scalar, s: &Scalar, recovery_id: u8) -> Self {
        Self::new(r.to_bytes().into(), s.to_bytes().into(), recovery_id)
    }

    /// R as a scalar; fails if the encoding is >= n
    pub fn r_scalar(&self) -> Result<Scalar> {
        scalar_from_bytes(&self.r)
    }

    /// S as a scalar; fails if the encoding is >= n
    pub fn s_scalar(&self) -> Result<Scalar> {
        scalar_from_bytes(&self.s)
    }

    /// Ethereum-style `v` (recovery id + 27)
    pub fn v(&self) -> u8 {
        self.recovery_id + 27
    }

    /// Convert to DER format
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let sig = ecdsa::Signature::from_scalars(FieldBytes::from(self.r), FieldBytes::from(self.s))
            .map_err(|e| Error::Crypto(e.to_string()))?;
        Ok(sig.to_der().as_bytes().to_vec())
    }

    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }
}

/// Protocol configuration shared by both parties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Bit length of the Paillier modulus Party1 generates
    pub paillier_modulus_bits: usize,

    /// Upper bound on nonce attempts per signing session; `None` retries forever
    pub max_nonce_attempts: Option<u32>,

    /// How long a party waits for a single peer message
    pub relay_timeout: Duration,

    /// Key split used by key agreement; both parties must agree on it
    #[serde(default)]
    pub key_split: KeySplit,
}

/// Smallest Paillier modulus accepted by [`ProtocolConfig::validate`]
pub const MIN_PAILLIER_MODULUS_BITS: usize = 1024;

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            paillier_modulus_bits: crate::DEFAULT_PAILLIER_MODULUS_BITS,
            max_nonce_attempts: Some(crate::DEFAULT_MAX_NONCE_ATTEMPTS),
            relay_timeout: Duration::from_secs(30),
            key_split: KeySplit::default(),
        }
    }
}

impl ProtocolConfig {
    /// Check the configuration for values the protocol cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.paillier_modulus_bits < MIN_PAILLIER_MODULUS_BITS {
            return Err(Error::InvalidConfig(format!(
                "Paillier modulus must be at least {} bits, got {}",
                MIN_PAILLIER_MODULUS_BITS, self.paillier_modulus_bits
            )));
        }
        if self.paillier_modulus_bits > crate::paillier::MAX_MODULUS_BITS {
            return Err(Error::InvalidConfig(format!(
                "Paillier modulus must be at most {} bits, got {}",
                crate::paillier::MAX_MODULUS_BITS,
                self.paillier_modulus_bits
            )));
        }
        if self.paillier_modulus_bits % 2 != 0 {
            return Err(Error::InvalidConfig(
                "Paillier modulus bit length must be even".into(),
            ));
        }
        if self.max_nonce_attempts == Some(0) {
            return Err(Error::InvalidConfig(
                "max_nonce_attempts must allow at least one attempt".into(),
            ));
        }
        if self.relay_timeout.is_zero() {
            return Err(Error::InvalidConfig("relay_timeout must be non-zero".into()));
        }
        Ok(())
    }
}
