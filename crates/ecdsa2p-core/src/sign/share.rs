//! Signature share exchange
//!
//! Party2 evaluates `k2^-1 * (z + R * x)` under Party1's Paillier key,
//! blinded by a multiple of n. With a multiplicative split the key term is
//! `(k2^-1 * R * x2) ⊛ Enc(x1)`; with an additive split it is
//! `(k2^-1 * R) ⊛ (Enc(x1) ⊕ Enc(x2))`. Party1 decrypts, multiplies by
//! `k1^-1` and normalizes to low-S.
//!
//! Neither side proves anything about its inputs: there is no proof that
//! `Enc(x1)` holds the discrete log of Party1's public share, nor that it
//! lies in `[n/3, 2n/3)`. A dishonest Party1 can therefore learn about
//! `x2`. Only use these types between parties that follow the protocol.

use super::{AgreedNonce, EncryptedKeyShare, FinalSignature, SignatureShareCiphertext};
use crate::keygen::is_valid_party1_share;
use crate::paillier::{Ciphertext, DecryptionKey, EncryptionKey};
use crate::types::{biguint_to_scalar, curve_order, scalar_to_biguint, SecretBigUint};
use crate::verify::{self, recovery_id};
use crate::{
    Error, KeyShare, KeySplit, MessageHash, PartyId, ProtocolConfig, Result, SecretScalar,
    SessionId, Signature, SigningKey,
};
use k256::elliptic_curve::scalar::IsHigh;
use k256::Scalar;
use num_bigint::{BigUint, RandBigInt};
use rand_core::{CryptoRng, RngCore};
use tracing::debug;

/// Smallest admissible Paillier modulus: the share plaintext must not wrap.
///
/// It stays below `n^3 + n^2` for a multiplicative split and below
/// `n^3 + 2n^2` for an additive one, where the key term is `v * (x1 + x2)`.
fn min_paillier_modulus(split: KeySplit) -> BigUint {
    let n = curve_order();
    let nn = &n * &n;
    let key_term = match split {
        KeySplit::Multiplicative => nn.clone(),
        KeySplit::Additive => &nn * 2u32,
    };
    &nn * &n + key_term
}

fn check_modulus(key: &EncryptionKey, split: KeySplit) -> Result<()> {
    if key.modulus() <= &min_paillier_modulus(split) {
        return Err(Error::RangeViolation(format!(
            "Paillier modulus of {} bits is too small for {} signature shares",
            key.bits(),
            split
        )));
    }
    Ok(())
}

fn expect_role(key_share: &KeyShare, party: PartyId) -> Result<()> {
    if key_share.party_id != party {
        return Err(Error::InvalidConfig(format!(
            "key share belongs to {}, expected {}",
            key_share.party_id, party
        )));
    }
    Ok(())
}

fn invert_nonce_share(nonce: &AgreedNonce) -> Result<SecretScalar> {
    Option::<Scalar>::from(nonce.nonce_share().invert())
        .map(SecretScalar::new)
        .ok_or_else(|| Error::Internal("ephemeral share is zero".into()))
}

fn check_attempt(nonce: &AgreedNonce, session_id: &SessionId, attempt: u32) -> Result<()> {
    if session_id != nonce.session_id() || attempt != nonce.attempt() {
        return Err(Error::ProtocolViolation(format!(
            "message for attempt {} does not match nonce of attempt {}",
            attempt,
            nonce.attempt()
        )));
    }
    Ok(())
}

/// Party1's signing state: its key share and the Paillier secret key.
///
/// Shared by reference across concurrent signing sessions.
pub struct Party1Signer {
    key_share: KeyShare,
    decryption_key: DecryptionKey,
}

impl Party1Signer {
    /// Generate a Paillier key of the configured size and encrypt `x1`
    pub fn generate<R: RngCore + CryptoRng>(
        key_share: KeyShare,
        session_id: SessionId,
        config: &ProtocolConfig,
        rng: &mut R,
    ) -> Result<(Self, EncryptedKeyShare)> {
        let decryption_key = DecryptionKey::random(rng, config.paillier_modulus_bits)?;
        Self::new(key_share, decryption_key, session_id, rng)
    }

    /// Encrypt `x1` under an existing Paillier key
    pub fn new<R: RngCore + CryptoRng>(
        key_share: KeyShare,
        decryption_key: DecryptionKey,
        session_id: SessionId,
        rng: &mut R,
    ) -> Result<(Self, EncryptedKeyShare)> {
        expect_role(&key_share, PartyId::Party1)?;
        if !is_valid_party1_share(key_share.secret_share()) {
            return Err(Error::RangeViolation(
                "party 1 key share is outside [n/3, 2n/3)".into(),
            ));
        }

        let encryption_key = decryption_key.encryption_key().clone();
        check_modulus(&encryption_key, key_share.signing_key.key_split())?;

        let x1 = SecretBigUint::new(scalar_to_biguint(key_share.secret_share()));
        let encrypted_share = encryption_key.encrypt(rng, x1.expose())?;
        debug!(bits = encryption_key.bits(), "Encrypted party 1 key share");

        Ok((
            Self {
                key_share,
                decryption_key,
            },
            EncryptedKeyShare {
                session_id,
                encryption_key,
                encrypted_share,
            },
        ))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key_share.signing_key
    }

    /// Decrypt Party2's share and assemble a verified low-S signature
    pub fn finalize(
        &self,
        nonce: &AgreedNonce,
        hash: &MessageHash,
        share: &SignatureShareCiphertext,
    ) -> Result<Signature> {
        check_attempt(nonce, &share.session_id, share.attempt)?;

        let plaintext = SecretBigUint::new(self.decryption_key.decrypt(&share.ciphertext)?);
        let k1_inv = invert_nonce_share(nonce)?;
        let s = biguint_to_scalar(plaintext.expose()) * k1_inv.expose();
        if bool::from(s.is_zero()) {
            return Err(Error::SignatureShareInvalid("S is zero".into()));
        }

        // S = min(S, n - S)
        let negated = bool::from(s.is_high());
        let s = if negated { -s } else { s };

        let signature = Signature::from_scalars(
            nonce.r(),
            &s,
            recovery_id(nonce.nonce_point(), negated),
        );
        if !verify::verify(&signature, hash, self.key_share.public_key()) {
            return Err(Error::SignatureShareInvalid(
                "assembled signature does not verify".into(),
            ));
        }
        Ok(signature)
    }
}

/// Party2's signing state: its key share plus Party1's encrypted share
pub struct Party2Signer {
    key_share: KeyShare,
    encryption_key: EncryptionKey,
    encrypted_share: Ciphertext,
}

impl Party2Signer {
    /// Accept Party1's Paillier key and `Enc(x1)`
    pub fn new(key_share: KeyShare, msg: &EncryptedKeyShare) -> Result<Self> {
        expect_role(&key_share, PartyId::Party2)?;
        check_modulus(&msg.encryption_key, key_share.signing_key.key_split())?;
        msg.encryption_key.validate_ciphertext(&msg.encrypted_share)?;

        Ok(Self {
            key_share,
            encryption_key: msg.encryption_key.clone(),
            encrypted_share: msg.encrypted_share.clone(),
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key_share.signing_key
    }

    /// Compute the encrypted signature share with a fresh blinding factor
    pub fn compute_share<R: RngCore + CryptoRng>(
        &self,
        nonce: &AgreedNonce,
        hash: &MessageHash,
        rng: &mut R,
    ) -> Result<SignatureShareCiphertext> {
        let n = curve_order();
        let rho = SecretBigUint::new(rng.gen_biguint_below(&(&n * &n)));
        self.compute_share_with_blinding(nonce, hash, rho.expose(), rng)
    }

    pub(crate) fn compute_share_with_blinding<R: RngCore + CryptoRng>(
        &self,
        nonce: &AgreedNonce,
        hash: &MessageHash,
        rho: &BigUint,
        rng: &mut R,
    ) -> Result<SignatureShareCiphertext> {
        let k2_inv = invert_nonce_share(nonce)?;
        let ek = &self.encryption_key;

        // t = rho * n + (k2^-1 * z mod n)
        let t = SecretBigUint::new(
            rho * curve_order() + scalar_to_biguint(&(*k2_inv.expose() * hash.to_scalar())),
        );
        let blinded = ek.encrypt(rng, t.expose())?;

        let keyed = match self.key_share.signing_key.key_split() {
            KeySplit::Multiplicative => {
                // v = k2^-1 * R * x2 mod n
                let v = SecretScalar::new(
                    *k2_inv.expose() * nonce.r() * self.key_share.secret_share(),
                );
                let v = SecretBigUint::new(scalar_to_biguint(v.expose()));
                ek.mul(&self.encrypted_share, v.expose())?
            }
            KeySplit::Additive => {
                // Enc(x1 + x2), then v = k2^-1 * R mod n
                let x2 = SecretBigUint::new(scalar_to_biguint(self.key_share.secret_share()));
                let joint = ek.add(&self.encrypted_share, &ek.encrypt(rng, x2.expose())?)?;
                let v = SecretBigUint::new(scalar_to_biguint(&(*k2_inv.expose() * nonce.r())));
                ek.mul(&joint, v.expose())?
            }
        };

        Ok(SignatureShareCiphertext {
            session_id: *nonce.session_id(),
            attempt: nonce.attempt(),
            ciphertext: ek.add(&blinded, &keyed)?,
        })
    }

    /// Check Party1's signature before accepting it
    pub fn check_signature(
        &self,
        nonce: &AgreedNonce,
        hash: &MessageHash,
        msg: &FinalSignature,
    ) -> Result<Signature> {
        check_attempt(nonce, &msg.session_id, msg.attempt)?;
        let signature = msg.signature;

        if signature.r_scalar().ok().as_ref() != Some(nonce.r()) {
            return Err(Error::SignatureShareInvalid(
                "signature R differs from the agreed nonce".into(),
            ));
        }
        match signature.s_scalar() {
            Ok(s) if !bool::from(s.is_high()) => {}
            _ => {
                return Err(Error::SignatureShareInvalid(
                    "S is not in canonical low-S form".into(),
                ))
            }
        }
        if !verify::verify(&signature, hash, self.key_share.public_key()) {
            return Err(Error::SignatureShareInvalid(
                "signature does not verify".into(),
            ));
        }
        Ok(signature)
    }
}
