//! Paillier encryption with `g = N + 1`
//!
//! Supports the two homomorphic operations the signature-share exchange
//! needs: `Enc(a) * Enc(b) = Enc(a + b)` and `Enc(a)^k = Enc(k * a)`, both
//! modulo `N^2`.

use crate::types::SecretBigUint;
use crate::{Error, Result};
use crypto_bigint::{Encoding, U2048};
use crypto_primes::RandomPrimeWithRng;
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{CheckedSub, One, Zero};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

/// Largest modulus [`DecryptionKey::random`] generates
pub const MAX_MODULUS_BITS: usize = 2 * U2048::BITS as usize;

/// Public key: the modulus `N = p * q`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EncryptionKeyWire", into = "EncryptionKeyWire")]
pub struct EncryptionKey {
    n: BigUint,
    nn: BigUint,
}

#[derive(Clone, Serialize, Deserialize)]
struct EncryptionKeyWire {
    #[serde(with = "biguint_hex")]
    n: BigUint,
}

impl From<EncryptionKeyWire> for EncryptionKey {
    fn from(wire: EncryptionKeyWire) -> Self {
        EncryptionKey::from_modulus(wire.n)
    }
}

impl From<EncryptionKey> for EncryptionKeyWire {
    fn from(key: EncryptionKey) -> Self {
        EncryptionKeyWire { n: key.n }
    }
}

impl EncryptionKey {
    /// Build a public key from its modulus
    pub fn from_modulus(n: BigUint) -> Self {
        let nn = &n * &n;
        Self { n, nn }
    }

    /// The modulus N
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Bit length of N
    pub fn bits(&self) -> u64 {
        self.n.bits()
    }

    /// Encrypt `m` with a fresh randomizer. Fails if `m >= N`.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, rng: &mut R, m: &BigUint) -> Result<Ciphertext> {
        if m >= &self.n {
            return Err(Error::RangeViolation(format!(
                "plaintext of {} bits does not fit a {}-bit Paillier modulus",
                m.bits(),
                self.n.bits()
            )));
        }

        let r = self.sample_randomizer(rng)?;
        // (1 + m*N) * r^N mod N^2
        let gm = (BigUint::one() + m * &self.n) % &self.nn;
        let rn = r.modpow(&self.n, &self.nn);
        Ok(Ciphertext((gm * rn) % &self.nn))
    }

    /// `Enc(a) ⊕ Enc(b) = Enc(a + b mod N)`
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.validate_ciphertext(a)?;
        self.validate_ciphertext(b)?;
        Ok(Ciphertext((&a.0 * &b.0) % &self.nn))
    }

    /// `k ⊛ Enc(a) = Enc(k * a mod N)`
    pub fn mul(&self, c: &Ciphertext, k: &BigUint) -> Result<Ciphertext> {
        self.validate_ciphertext(c)?;
        Ok(Ciphertext(c.0.modpow(k, &self.nn)))
    }

    /// Reject values outside `Z*_{N^2}`: zero, `>= N^2`, or sharing a factor with N
    pub fn validate_ciphertext(&self, c: &Ciphertext) -> Result<()> {
        if c.0.is_zero() || c.0 >= self.nn || !c.0.gcd(&self.n).is_one() {
            return Err(Error::RangeViolation(
                "ciphertext is not an element of Z*_{N^2}".into(),
            ));
        }
        Ok(())
    }

    fn sample_randomizer<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<BigUint> {
        // A non-unit would reveal a factor of N; with honest keys this loop
        // practically never runs twice.
        for _ in 0..crate::CRYPTOGRAPHIC_RETRY_MAX {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                return Ok(r);
            }
        }
        Err(Error::Crypto("failed to sample a Paillier randomizer".into()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bits", &self.n.bits())
            .finish()
    }
}

/// Secret key: `phi(N)` and `phi(N)^-1 mod N`.
///
/// Not `Clone`. The primes are wiped once the key is built and the derived
/// values when it is dropped. Scratch buffers inside num-bigint's own
/// arithmetic are not scrubbed.
pub struct DecryptionKey {
    totient: SecretBigUint,
    inv_totient: SecretBigUint,
    encryption_key: EncryptionKey,
}

impl DecryptionKey {
    /// Generate a key whose modulus has exactly `modulus_bits` bits
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R, modulus_bits: usize) -> Result<Self> {
        if modulus_bits < 16 || modulus_bits > MAX_MODULUS_BITS || modulus_bits % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "invalid Paillier modulus size: {} bits",
                modulus_bits
            )));
        }
        let prime_bits = (modulus_bits / 2) as u32;

        for attempt in 1..=crate::CRYPTOGRAPHIC_RETRY_MAX {
            let p = random_prime(rng, prime_bits);
            let q = random_prime(rng, prime_bits);

            match Self::from_primes(p, q) {
                Ok(key) if key.encryption_key.bits() == modulus_bits as u64 => {
                    debug!(bits = modulus_bits, attempt, "Generated Paillier key");
                    return Ok(key);
                }
                Ok(_) | Err(Error::Crypto(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::Crypto("failed to generate a Paillier key".into()))
    }

    /// Build a key from two distinct primes of equal size.
    ///
    /// Primality is not re-checked here.
    pub fn from_primes(p: BigUint, q: BigUint) -> Result<Self> {
        let (p, q) = (SecretBigUint::new(p), SecretBigUint::new(q));
        if p.expose() == q.expose() {
            return Err(Error::Crypto("Paillier primes must be distinct".into()));
        }
        if p.expose().bits() != q.expose().bits() {
            return Err(Error::Crypto("Paillier primes must have equal length".into()));
        }

        let n = p.expose() * q.expose();
        let p_minus_one = SecretBigUint::new(p.expose() - 1u32);
        let q_minus_one = SecretBigUint::new(q.expose() - 1u32);
        let totient = SecretBigUint::new(p_minus_one.expose() * q_minus_one.expose());
        if !n.gcd(totient.expose()).is_one() {
            return Err(Error::Crypto("gcd(N, phi(N)) != 1".into()));
        }
        let inv_totient = totient
            .expose()
            .modinv(&n)
            .map(SecretBigUint::new)
            .ok_or_else(|| Error::Crypto("phi(N) is not invertible mod N".into()))?;

        Ok(Self {
            totient,
            inv_totient,
            encryption_key: EncryptionKey::from_modulus(n),
        })
    }

    /// The matching public key
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption_key
    }

    /// Decrypt to an integer in `[0, N)`
    pub fn decrypt(&self, c: &Ciphertext) -> Result<BigUint> {
        let ek = &self.encryption_key;
        ek.validate_ciphertext(c)?;

        // L(c^phi mod N^2) * phi^-1 mod N, with L(u) = (u - 1) / N
        let u = SecretBigUint::new(c.0.modpow(self.totient.expose(), &ek.nn));
        let u_minus_one = u
            .expose()
            .checked_sub(&BigUint::one())
            .map(SecretBigUint::new)
            .ok_or_else(|| Error::RangeViolation("ciphertext decrypts outside Z_N".into()))?;
        let l = SecretBigUint::new(u_minus_one.expose() / &ek.n);
        Ok((l.expose() * self.inv_totient.expose()) % &ek.n)
    }
}

fn random_prime<R: RngCore + CryptoRng>(rng: &mut R, bits: u32) -> BigUint {
    let mut prime = U2048::generate_prime_with_rng(rng, bits);
    let mut bytes = Encoding::to_be_bytes(&prime);
    let value = BigUint::from_bytes_be(&bytes);
    prime.zeroize();
    bytes.zeroize();
    value
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("bits", &self.encryption_key.bits())
            .finish_non_exhaustive()
    }
}

/// Paillier ciphertext, an element of `Z*_{N^2}`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(#[serde(with = "biguint_hex")] BigUint);

impl Ciphertext {
    /// Raw ciphertext value
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bits)", self.0.bits())
    }
}

/// Serde helpers for big-endian hex integers
pub(crate) mod biguint_hex {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value.to_bytes_be()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}
