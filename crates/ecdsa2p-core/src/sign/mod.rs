//! Two-party signing
//!
//! Per message: a nonce agreement fixes `R`, Party2 computes an encrypted
//! signature share, Party1 decrypts it into `S`. A failed nonce or share
//! restarts the attempt with entirely fresh ephemeral values.

mod messages;
mod nonce;
mod protocol;
mod retry;
mod share;

pub use messages::*;
pub use nonce::{AgreedNonce, NonceAgreement};
pub use protocol::{run_party1_setup, run_party1_signing, run_party2_setup, run_party2_signing};
pub use retry::NonceRetry;
pub use share::{Party1Signer, Party2Signer};
