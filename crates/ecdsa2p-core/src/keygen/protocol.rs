//! Key agreement over a relay

use super::{KeyAgreement, KeyConfirm, KeyShareCommit, KeyShareReveal};
use crate::mpc::{finish_session, receive_within, Relay};
use crate::{KeyShare, PartyId, ProtocolConfig, Result, SessionId};
use rand::rngs::OsRng;
use tracing::{debug, info, instrument};

const ROUND_COMMIT: u32 = 1;
const ROUND_REVEAL: u32 = 2;
const ROUND_CONFIRM: u32 = 3;

/// Run one party's side of the key agreement
///
/// # Arguments
/// * `party` - Role of the calling party
/// * `session_id` - Identifier shared by both parties for this agreement
/// * `config` - Protocol configuration
/// * `relay` - Message relay for communication
///
/// # Returns
/// The party's key share once both parties agree on the joint public key.
/// On failure the party's side of the session is closed on the relay; on
/// success it stays open for the signer setup that follows.
#[instrument(skip(session_id, config, relay), fields(session = %hex::encode(&session_id[..8])))]
pub async fn run_key_agreement<R: Relay>(
    party: PartyId,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<KeyShare> {
    config.validate()?;
    match key_agreement(party, session_id, config, relay).await {
        Ok(key_share) => Ok(key_share),
        Err(e) => finish_session(relay, session_id, party, Err(e)).await,
    }
}

async fn key_agreement<R: Relay>(
    party: PartyId,
    session_id: &SessionId,
    config: &ProtocolConfig,
    relay: &R,
) -> Result<KeyShare> {
    info!(%party, split = %config.key_split, "Starting key agreement");

    // Round 1: commit to the public share
    debug!("Key agreement round 1: commitment");
    let (mut agreement, commit) =
        KeyAgreement::new(party, *session_id, config.key_split, &mut OsRng)?;
    relay.send(session_id, ROUND_COMMIT, party.peer(), &commit).await?;
    let peer_commit: KeyShareCommit =
        receive_within(relay, session_id, ROUND_COMMIT, party, config.relay_timeout).await?;

    // Round 2: reveal once both commitments are in
    debug!("Key agreement round 2: reveal");
    let reveal = agreement.receive_commit(&peer_commit)?;
    relay.send(session_id, ROUND_REVEAL, party.peer(), &reveal).await?;
    let peer_reveal: KeyShareReveal =
        receive_within(relay, session_id, ROUND_REVEAL, party, config.relay_timeout).await?;

    // Round 3: cross-check the joint public key
    debug!("Key agreement round 3: confirmation");
    let confirm = agreement.receive_reveal(&peer_reveal)?;
    relay.send(session_id, ROUND_CONFIRM, party.peer(), &confirm).await?;
    let peer_confirm: KeyConfirm =
        receive_within(relay, session_id, ROUND_CONFIRM, party, config.relay_timeout).await?;

    let key_share = agreement.receive_confirm(&peer_confirm)?;

    info!(
        %party,
        public_key = hex::encode(key_share.signing_key.public_key_bytes()),
        "Key agreement completed successfully"
    );

    Ok(key_share)
}
