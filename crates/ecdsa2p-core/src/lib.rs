//! # ECDSA2P Core
//!
//! Two-party threshold ECDSA on secp256k1.
//!
//! The signing key is split multiplicatively, `x = x1 * x2`, or additively,
//! `x = x1 + x2` (see [`KeySplit`]). Every nonce is split multiplicatively,
//! `k = k1 * k2`. Neither party ever holds `x` or `k`.
//!
//! This crate provides:
//! - Hash commitments for the commit/reveal barriers ([`commitment`])
//! - Key agreement producing the joint public key ([`keygen`])
//! - Nonce agreement and Paillier-based signature shares ([`sign`])
//! - Plain ECDSA verification against the joint key ([`verify`])
//! - A message relay seam with an in-memory implementation ([`mpc`])
//!
//! ## Protocol Overview
//!
//! 1. Both parties commit to `x_i * G`, reveal, and derive `H = x1 * x2 * G`
//!    (or `H = x1 * G + x2 * G`).
//! 2. Party1 sends Party2 a Paillier key and `Enc(x1)`.
//! 3. Per signature, both parties commit to `k_i * G`, reveal, and agree on
//!    `R = (k1 * k2 * G).x mod n`.
//! 4. Party2 homomorphically evaluates `k2^-1 * (z + R * x)` (blinded by
//!    `rho * n`) and Party1 decrypts and multiplies by `k1^-1`.
//!
//! ## Security
//!
//! The zero-knowledge proofs that would make this protocol secure against a
//! malicious peer (discrete-log proofs on the public shares, a range proof on
//! `Enc(x1)`) are **not implemented**. Use it only between parties that follow
//! the protocol.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ecdsa2p_core::{keygen, sign, MessageHash, PartyId, ProtocolConfig};
//!
//! // Party1's task; Party2 runs the mirror image with `run_party2_*`
//! let key_share = keygen::run_key_agreement(PartyId::Party1, &key_session, &config, &relay).await?;
//! let signer = sign::run_party1_setup(key_share, &key_session, &config, &relay).await?;
//! let signature = sign::run_party1_signing(&signer, &sign_session, &config, &relay).await?;
//! ```

pub mod commitment;
pub mod error;
pub mod keygen;
pub mod mpc;
pub mod paillier;
pub mod sign;
pub mod types;
pub mod verify;

mod exchange;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};
pub use types::{
    new_session_id, KeyShare, KeySplit, PartyId, PointBytes, ProtocolConfig, SecretScalar, SessionId,
    Signature, SigningKey,
};
pub use verify::MessageHash;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Paillier modulus size
pub const DEFAULT_PAILLIER_MODULUS_BITS: usize = 2048;

/// Default bound on nonce attempts per signing session
pub const DEFAULT_MAX_NONCE_ATTEMPTS: u32 = 8;

/// Bound on rejection-sampling loops that only repeat with negligible probability
pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500;
