//! Signing over a relay
//!
//! Round numbers inside a signing session: round 0 carries the
//! [`SignRequest`], and every nonce attempt `a` owns the block starting at
//! `1 + a * ROUNDS_PER_ATTEMPT`, so messages from an abandoned attempt can
//! never be mistaken for the current one.
//!
//! Each party closes its side of a session on the relay when it is done,
//! whether it signed or gave up.

use super::{
    AgreedNonce, EncryptedKeyShare, FinalSignature, NonceAck, NonceAgreement, NonceCommit,
    NonceConfirm, NonceRetry, NonceReveal, Party1Signer, Party2Signer, SignOutcome, SignRequest,
    SignatureAck, SignatureShareCiphertext,
};
use crate::mpc::{finish_session, receive_within, Relay};
use crate::paillier::DecryptionKey;
use crate::{
    Error, KeyShare, MessageHash, PartyId, ProtocolConfig, Result, SessionId, Signature,
};
use rand::rngs::OsRng;
use tracing::{debug, info, instrument, warn};

/// Setup continues the key agreement's round numbering, so it may reuse
/// that session id.
const ROUND_KEY_SETUP: u32 = 4;

const ROUND_SIGN_REQUEST: u32 = 0;

const ROUNDS_PER_ATTEMPT: u32 = 7;
const STEP_NONCE_COMMIT: u32 = 0;
const STEP_NONCE_REVEAL: u32 = 1;
const STEP_NONCE_CONFIRM: u32 = 2;
const STEP_NONCE_ACK: u32 = 3;
const STEP_SHARE: u32 = 4;
const STEP_OUTCOME: u32 = 5;
const STEP_ACK: u32 = 6;

fn round(attempt: u32, step: u32) -> Result<u32> {
    attempt
        .checked_mul(ROUNDS_PER_ATTEMPT)
        .and_then(|base| base.checked_add(1 + step))
        .ok_or(Error::RetriesExhausted { attempts: attempt })
}

fn session_tag(session_id: &SessionId) -> String {
    hex::encode(&session_id[..8])
}

/// Party1 setup: generate the Paillier key and send `Enc(x1)` to Party2
#[instrument(skip_all, fields(session = %session_tag(session_id)))]
pub async fn run_party1_setup<R: Relay>(
    key_share: KeyShare,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Party1Signer> {
    config.validate()?;
    let result = party1_setup(key_share, session_id, config, relay).await;
    finish_session(relay, session_id, PartyId::Party1, result).await
}

async fn party1_setup<R: Relay>(
    key_share: KeyShare,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Party1Signer> {
    info!(bits = config.paillier_modulus_bits, "Generating Paillier key");

    let bits = config.paillier_modulus_bits;
    let decryption_key = tokio::task::spawn_blocking(move || DecryptionKey::random(&mut OsRng, bits))
        .await
        .map_err(|e| Error::Internal(format!("Paillier key generation task failed: {}", e)))??;

    let (signer, setup) = Party1Signer::new(key_share, decryption_key, *session_id, &mut OsRng)?;
    relay
        .send(session_id, ROUND_KEY_SETUP, PartyId::Party2, &setup)
        .await?;

    info!("Sent encrypted key share");
    Ok(signer)
}

/// Party2 setup: receive and check Party1's Paillier key and `Enc(x1)`
#[instrument(skip_all, fields(session = %session_tag(session_id)))]
pub async fn run_party2_setup<R: Relay>(
    key_share: KeyShare,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Party2Signer> {
    config.validate()?;
    let result = party2_setup(key_share, session_id, config, relay).await;
    finish_session(relay, session_id, PartyId::Party2, result).await
}

async fn party2_setup<R: Relay>(
    key_share: KeyShare,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Party2Signer> {
    let setup: EncryptedKeyShare = receive_within(
        relay,
        session_id,
        ROUND_KEY_SETUP,
        PartyId::Party2,
        config.relay_timeout,
    )
    .await?;
    if &setup.session_id != session_id {
        return Err(Error::ProtocolViolation(
            "encrypted key share belongs to a different session".into(),
        ));
    }

    let signer = Party2Signer::new(key_share, &setup)?;
    info!(bits = setup.encryption_key.bits(), "Accepted encrypted key share");
    Ok(signer)
}

/// Run Party1's side of one signing session
///
/// Waits for Party2's [`SignRequest`], then runs nonce attempts until a
/// signature is produced and acknowledged or the retry budget runs out.
#[instrument(skip_all, fields(session = %session_tag(session_id)))]
pub async fn run_party1_signing<R: Relay>(
    signer: &Party1Signer,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    config.validate()?;
    let result = party1_session(signer, session_id, config, relay).await;
    finish_session(relay, session_id, PartyId::Party1, result).await
}

async fn party1_session<R: Relay>(
    signer: &Party1Signer,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    let request: SignRequest = receive_within(
        relay,
        session_id,
        ROUND_SIGN_REQUEST,
        PartyId::Party1,
        config.relay_timeout,
    )
    .await?;
    if &request.session_id != session_id {
        return Err(Error::ProtocolViolation(
            "sign request belongs to a different session".into(),
        ));
    }
    let hash = request.message_hash;
    info!(message_hash = hex::encode(hash.as_bytes()), "Starting signing");

    let mut retry = NonceRetry::new(config.max_nonce_attempts);
    loop {
        let attempt = retry.attempt();
        match party1_attempt(signer, session_id, attempt, &hash, config, relay).await {
            Ok(signature) => {
                info!(
                    attempt,
                    r = hex::encode(signature.r),
                    s = hex::encode(signature.s),
                    "Signing completed successfully"
                );
                return Ok(signature);
            }
            Err(e) => {
                retry.advance(e)?;
            }
        }
    }
}

async fn party1_attempt<R: Relay>(
    signer: &Party1Signer,
    session_id: &SessionId,
    attempt: u32,
    hash: &MessageHash,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    let nonce = agree_nonce(PartyId::Party1, session_id, attempt, config, relay).await?;

    debug!(attempt, "Signing round: decrypt share");
    let share: SignatureShareCiphertext = receive_within(
        relay,
        session_id,
        round(attempt, STEP_SHARE)?,
        PartyId::Party1,
        config.relay_timeout,
    )
    .await?;

    let signature = match signer.finalize(&nonce, hash, &share) {
        Ok(signature) => signature,
        Err(e) => {
            warn!(attempt, error = %e, "Abandoning signing attempt");
            let outcome = SignOutcome::Abandoned {
                session_id: *session_id,
                attempt,
                reason: e.to_string(),
                retryable: e.is_retryable(),
            };
            relay
                .send(session_id, round(attempt, STEP_OUTCOME)?, PartyId::Party2, &outcome)
                .await?;
            return Err(e);
        }
    };

    let outcome = SignOutcome::Signed(FinalSignature {
        session_id: *session_id,
        attempt,
        signature,
    });
    relay
        .send(session_id, round(attempt, STEP_OUTCOME)?, PartyId::Party2, &outcome)
        .await?;

    let ack: SignatureAck = receive_within(
        relay,
        session_id,
        round(attempt, STEP_ACK)?,
        PartyId::Party1,
        config.relay_timeout,
    )
    .await?;
    if &ack.session_id != session_id || ack.attempt != attempt {
        return Err(Error::ProtocolViolation(
            "signature acknowledgement does not match the attempt".into(),
        ));
    }
    if !ack.accepted {
        return Err(Error::SignatureShareInvalid(
            "party 2 rejected the signature".into(),
        ));
    }

    Ok(signature)
}

/// Run Party2's side of one signing session over `hash`
#[instrument(skip_all, fields(session = %session_tag(session_id)))]
pub async fn run_party2_signing<R: Relay>(
    signer: &Party2Signer,
    session_id: &SessionId,
    hash: &MessageHash,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    config.validate()?;
    let result = party2_session(signer, session_id, hash, config, relay).await;
    finish_session(relay, session_id, PartyId::Party2, result).await
}

async fn party2_session<R: Relay>(
    signer: &Party2Signer,
    session_id: &SessionId,
    hash: &MessageHash,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    info!(message_hash = hex::encode(hash.as_bytes()), "Starting signing");

    let request = SignRequest {
        session_id: *session_id,
        message_hash: *hash,
    };
    relay
        .send(session_id, ROUND_SIGN_REQUEST, PartyId::Party1, &request)
        .await?;

    let mut retry = NonceRetry::new(config.max_nonce_attempts);
    loop {
        let attempt = retry.attempt();
        match party2_attempt(signer, session_id, attempt, hash, config, relay).await {
            Ok(signature) => {
                info!(attempt, v = signature.v(), "Signature accepted");
                return Ok(signature);
            }
            Err(e) => {
                retry.advance(e)?;
            }
        }
    }
}

async fn party2_attempt<R: Relay>(
    signer: &Party2Signer,
    session_id: &SessionId,
    attempt: u32,
    hash: &MessageHash,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<Signature> {
    let nonce = agree_nonce(PartyId::Party2, session_id, attempt, config, relay).await?;

    debug!(attempt, "Signing round: encrypted share");
    let share = signer.compute_share(&nonce, hash, &mut OsRng)?;
    relay
        .send(session_id, round(attempt, STEP_SHARE)?, PartyId::Party1, &share)
        .await?;

    let outcome: SignOutcome = receive_within(
        relay,
        session_id,
        round(attempt, STEP_OUTCOME)?,
        PartyId::Party2,
        config.relay_timeout,
    )
    .await?;

    match outcome {
        SignOutcome::Signed(final_signature) => {
            let checked = signer.check_signature(&nonce, hash, &final_signature);
            let ack = SignatureAck {
                session_id: *session_id,
                attempt,
                accepted: checked.is_ok(),
            };
            relay
                .send(session_id, round(attempt, STEP_ACK)?, PartyId::Party1, &ack)
                .await?;
            checked
        }
        SignOutcome::Abandoned {
            session_id: abandoned_session,
            attempt: abandoned_attempt,
            reason,
            retryable,
        } => {
            if &abandoned_session != session_id || abandoned_attempt != attempt {
                return Err(Error::ProtocolViolation(
                    "abandon notice does not match the attempt".into(),
                ));
            }
            if retryable {
                Err(Error::SignatureShareInvalid(reason))
            } else {
                Err(Error::ProtocolViolation(format!("party 1 aborted: {}", reason)))
            }
        }
    }
}

/// Commit, reveal, confirm and acknowledge one nonce attempt
async fn agree_nonce<R: Relay>(
    party: PartyId,
    session_id: &SessionId,
    attempt: u32,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<AgreedNonce> {
    let peer = party.peer();

    debug!(attempt, "Nonce round 1: commitment");
    let (mut agreement, commit) = NonceAgreement::new(party, *session_id, attempt, &mut OsRng)?;
    let commit_round = round(attempt, STEP_NONCE_COMMIT)?;
    relay.send(session_id, commit_round, peer, &commit).await?;
    let peer_commit: NonceCommit =
        receive_within(relay, session_id, commit_round, party, config.relay_timeout).await?;

    debug!(attempt, "Nonce round 2: reveal");
    let reveal = agreement.receive_commit(&peer_commit)?;
    let reveal_round = round(attempt, STEP_NONCE_REVEAL)?;
    relay.send(session_id, reveal_round, peer, &reveal).await?;
    let peer_reveal: NonceReveal =
        receive_within(relay, session_id, reveal_round, party, config.relay_timeout).await?;

    debug!(attempt, "Nonce round 3: confirmation");
    let confirm = agreement.receive_reveal(&peer_reveal)?;
    let confirm_round = round(attempt, STEP_NONCE_CONFIRM)?;
    relay.send(session_id, confirm_round, peer, &confirm).await?;
    let peer_confirm: NonceConfirm =
        receive_within(relay, session_id, confirm_round, party, config.relay_timeout).await?;

    // Round 4: both sides learn each other's verdict before either moves on
    debug!(attempt, "Nonce round 4: acknowledgement");
    let verdict = agreement.receive_confirm(&peer_confirm);
    let ack = NonceAck {
        party_id: party,
        session_id: *session_id,
        attempt,
        accepted: verdict.is_ok(),
        retryable: verdict.as_ref().err().map_or(true, Error::is_retryable),
    };
    let ack_round = round(attempt, STEP_NONCE_ACK)?;
    relay.send(session_id, ack_round, peer, &ack).await?;
    let peer_ack: NonceAck =
        receive_within(relay, session_id, ack_round, party, config.relay_timeout).await?;
    if peer_ack.party_id != peer
        || &peer_ack.session_id != session_id
        || peer_ack.attempt != attempt
    {
        return Err(Error::ProtocolViolation(
            "nonce acknowledgement does not match the attempt".into(),
        ));
    }

    let nonce = verdict?;
    if !peer_ack.accepted {
        warn!(attempt, %peer, "Peer rejected the nonce");
        return Err(if peer_ack.retryable {
            Error::InvalidNonce(format!("{} rejected R", peer))
        } else {
            Error::ProtocolViolation(format!("{} aborted the nonce agreement", peer))
        });
    }
    debug!(attempt, r = hex::encode(nonce.r().to_bytes()), "Nonce agreed");
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::run_key_agreement;
    use crate::mpc::MemoryRelay;
    use crate::test_utils::{key_agreement_pair, seeded_rng, signer_pair, TamperingRelay};
    use crate::{new_session_id, verify};
    use futures_util::future::join_all;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn fast_config() -> ProtocolConfig {
        ProtocolConfig {
            paillier_modulus_bits: 1024,
            relay_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn is_nonce_confirm(value: &Value) -> bool {
        value.get("r").is_some() && value.get("party_id").is_some()
    }

    fn is_nonce_ack(value: &Value) -> bool {
        value.get("accepted").is_some() && value.get("party_id").is_some()
    }

    fn is_signature_ack(value: &Value) -> bool {
        value.get("accepted").is_some() && value.get("party_id").is_none()
    }

    #[test]
    fn test_round_layout() {
        assert_eq!(round(0, STEP_NONCE_COMMIT).unwrap(), 1);
        assert_eq!(round(0, STEP_NONCE_ACK).unwrap(), 4);
        assert_eq!(round(0, STEP_ACK).unwrap(), 7);
        assert_eq!(round(1, STEP_NONCE_COMMIT).unwrap(), 8);
        assert!(round(u32::MAX, STEP_ACK).is_err());
    }

    #[tokio::test]
    async fn test_keygen_setup_and_sign() {
        let relay = MemoryRelay::new();
        let config = fast_config();
        let key_session = new_session_id(&mut OsRng);

        let (share1, share2) = tokio::join!(
            run_key_agreement(PartyId::Party1, &key_session, &config, &relay),
            run_key_agreement(PartyId::Party2, &key_session, &config, &relay),
        );
        let (signer1, signer2) = tokio::join!(
            run_party1_setup(share1.unwrap(), &key_session, &config, &relay),
            run_party2_setup(share2.unwrap(), &key_session, &config, &relay),
        );
        let (signer1, signer2) = (signer1.unwrap(), signer2.unwrap());

        let session_id = new_session_id(&mut OsRng);
        let hash = MessageHash::from_message(b"Some secret message to be encrypted!");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        let (sig1, sig2) = (sig1.unwrap(), sig2.unwrap());

        assert_eq!(sig1, sig2);
        assert!(verify::verify(&sig1, &hash, signer2.signing_key().public_key()));
        assert_eq!(relay.pending(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sessions() {
        let mut rng = seeded_rng(21);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let relay = MemoryRelay::new();
        let config = fast_config();

        let sessions: Vec<(SessionId, MessageHash)> = (0u32..8)
            .map(|i| {
                (
                    new_session_id(&mut rng),
                    MessageHash::from_message(format!("message {}", i).as_bytes()),
                )
            })
            .collect();

        let results = join_all(sessions.iter().map(|(session_id, hash)| {
            let (signer1, signer2, relay, config) = (&signer1, &signer2, &relay, &config);
            async move {
                tokio::join!(
                    run_party1_signing(signer1, session_id, config, relay),
                    run_party2_signing(signer2, session_id, hash, config, relay),
                )
            }
        }))
        .await;

        let public_key = signer1.signing_key().public_key();
        let mut rs = Vec::new();
        for ((sig1, sig2), (_, hash)) in results.into_iter().zip(&sessions) {
            let (sig1, sig2) = (sig1.unwrap(), sig2.unwrap());
            assert_eq!(sig1, sig2);
            assert!(verify::verify(&sig1, hash, public_key));
            rs.push(sig1.r);
        }
        rs.sort();
        rs.dedup();
        assert_eq!(rs.len(), sessions.len());
    }

    #[tokio::test]
    async fn test_invalid_first_nonce_retries_once() {
        let mut rng = seeded_rng(22);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let config = fast_config();

        // Both confirmations of attempt 0 arrive as R = 0
        let relay = TamperingRelay::new(|_, _, value| {
            if is_nonce_confirm(value) && value["attempt"] == 0 {
                value["r"] = serde_json::to_value([0u8; 32]).unwrap();
            }
        });

        let session_id = [6u8; 32];
        let hash = MessageHash::from_message(b"retry me");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        let (sig1, sig2) = (sig1.unwrap(), sig2.unwrap());
        assert_eq!(sig1, sig2);
        assert!(verify::verify(&sig1, &hash, signer1.signing_key().public_key()));

        // R candidates per attempt, as the parties computed them
        let mut candidates: BTreeMap<u64, Vec<Value>> = BTreeMap::new();
        for (_, _, value) in relay.sent() {
            if is_nonce_confirm(&value) {
                let attempt = value["attempt"].as_u64().unwrap();
                candidates.entry(attempt).or_default().push(value["r"].clone());
            }
        }
        assert_eq!(candidates.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_ne!(candidates[&0][0], candidates[&1][0]);

        let final_r = serde_json::to_value(sig1.r).unwrap();
        assert_eq!(candidates[&1][0], final_r);
        assert_ne!(sig1.r, [0u8; 32]);
        assert_eq!(relay.pending(), 0);
    }

    #[tokio::test]
    async fn test_one_sided_nonce_rejection_retries_both() {
        let mut rng = seeded_rng(26);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let config = fast_config();

        // Only party 1 sees a wrong R on attempt 0; party 2's check passes
        let relay = TamperingRelay::new(|_, to, value| {
            if to == PartyId::Party1 && is_nonce_confirm(value) && value["attempt"] == 0 {
                value["r"] = serde_json::to_value([0u8; 32]).unwrap();
            }
        });

        let session_id = [10u8; 32];
        let hash = MessageHash::from_message(b"one side disagrees");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        let (sig1, sig2) = (sig1.unwrap(), sig2.unwrap());
        assert_eq!(sig1, sig2);
        assert!(verify::verify(&sig1, &hash, signer1.signing_key().public_key()));

        let acks: Vec<(PartyId, Value)> = relay
            .sent()
            .into_iter()
            .filter(|(_, _, v)| is_nonce_ack(v))
            .map(|(_, to, v)| (to, v))
            .collect();
        assert_eq!(acks.len(), 4);
        for (to, ack) in &acks {
            let expected = ack["attempt"] == 1 || *to == PartyId::Party1;
            assert_eq!(ack["accepted"], expected, "ack to {}: {}", to, ack);
        }
        assert_eq!(relay.pending(), 0);
    }

    #[tokio::test]
    async fn test_stale_messages_are_dropped_when_session_closes() {
        let mut rng = seeded_rng(27);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let relay = MemoryRelay::new();
        let config = fast_config();
        let session_id = [11u8; 32];

        // Queued for rounds neither party reads
        relay
            .send(&session_id, round(3, STEP_SHARE).unwrap(), PartyId::Party1, &"stale")
            .await
            .unwrap();
        relay
            .send(&session_id, round(0, STEP_SHARE).unwrap(), PartyId::Party2, &"stale")
            .await
            .unwrap();
        relay
            .send(&[12u8; 32], 1, PartyId::Party2, &"other session")
            .await
            .unwrap();

        let hash = MessageHash::from_message(b"clean up after me");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        assert_eq!(sig1.unwrap(), sig2.unwrap());
        assert_eq!(relay.pending(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_enforced() {
        let mut rng = seeded_rng(23);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let config = ProtocolConfig {
            max_nonce_attempts: Some(2),
            ..fast_config()
        };

        let relay = TamperingRelay::new(|_, _, value| {
            if is_nonce_confirm(value) {
                value["r"] = serde_json::to_value([0u8; 32]).unwrap();
            }
        });

        let session_id = [7u8; 32];
        let hash = MessageHash::from_message(b"never signed");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        assert!(matches!(sig1, Err(Error::RetriesExhausted { attempts: 2 })));
        assert!(matches!(sig2, Err(Error::RetriesExhausted { attempts: 2 })));
    }

    #[tokio::test]
    async fn test_corrupted_signature_is_rejected_and_retried() {
        let mut rng = seeded_rng(24);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let config = fast_config();

        let relay = TamperingRelay::new(|_, to, value| {
            if to == PartyId::Party2 {
                if let Some(signed) = value.get_mut("Signed") {
                    if signed["attempt"] == 0 {
                        signed["signature"]["s"][31] = Value::from(0u8);
                        signed["signature"]["s"][30] = Value::from(1u8);
                    }
                }
            }
        });

        let session_id = [8u8; 32];
        let hash = MessageHash::from_message(b"tampered in transit");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        let (sig1, sig2) = (sig1.unwrap(), sig2.unwrap());
        assert_eq!(sig1, sig2);

        let acks: Vec<Value> = relay
            .sent()
            .into_iter()
            .filter(|(_, _, v)| is_signature_ack(v))
            .map(|(_, _, v)| v)
            .collect();
        assert_eq!(acks.len(), 2);
        assert_eq!(acks[0]["accepted"], false);
        assert_eq!(acks[1]["accepted"], true);
    }

    #[tokio::test]
    async fn test_party1_abort_is_not_retried() {
        let mut rng = seeded_rng(25);
        let (signer1, signer2) = signer_pair(key_agreement_pair(&mut rng), &mut rng);
        let config = fast_config();

        // A share ciphertext of zero is outside Z*_{N^2}
        let relay = TamperingRelay::new(|_, to, value| {
            if to == PartyId::Party1 && value.get("ciphertext").is_some() {
                value["ciphertext"] = Value::from("00");
            }
        });

        let session_id = [9u8; 32];
        let hash = MessageHash::from_message(b"abort");
        let (sig1, sig2) = tokio::join!(
            run_party1_signing(&signer1, &session_id, &config, &relay),
            run_party2_signing(&signer2, &session_id, &hash, &config, &relay),
        );
        assert!(matches!(sig1, Err(Error::RangeViolation(_))));
        assert!(matches!(sig2, Err(Error::ProtocolViolation(_))));
        assert_eq!(relay.pending(), 0);
    }
}
