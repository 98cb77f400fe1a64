//! Message transport between the two parties

use crate::{Error, PartyId, Result, SessionId};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub use ::async_trait::async_trait;

/// Point-to-point message relay.
///
/// Messages are addressed by `(session_id, round, recipient)` and delivered
/// in the order they were sent. The relay is not trusted for confidentiality
/// or authenticity; every payload is checked by the receiving state machine.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Send a message to the given party
    async fn send<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()>;

    /// Wait for the next message addressed to `me` in this round
    async fn receive<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        me: PartyId,
    ) -> Result<T>;

    /// Drop whatever is still queued for `me` in this session and return
    /// how many messages were discarded
    async fn close_session(&self, _session_id: &SessionId, _me: PartyId) -> Result<usize> {
        Ok(0)
    }
}

/// Close `me`'s side of a finished or aborted session, then hand back `result`
pub(crate) async fn finish_session<R, T>(
    relay: &R,
    session_id: &SessionId,
    me: PartyId,
    result: Result<T>,
) -> Result<T>
where
    R: Relay,
{
    match relay.close_session(session_id, me).await {
        Ok(0) => {}
        Ok(dropped) => debug!(%me, dropped, "Discarded undelivered messages"),
        Err(e) => warn!(%me, error = %e, "Failed to close relay session"),
    }
    result
}

/// Receive with a deadline, mapping expiry to [`Error::Timeout`]
pub async fn receive_within<R, T>(
    relay: &R,
    session_id: &SessionId,
    round: u32,
    me: PartyId,
    timeout: Duration,
) -> Result<T>
where
    R: Relay,
    T: DeserializeOwned + Send,
{
    match tokio::time::timeout(timeout, relay.receive(session_id, round, me)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "round {} message for {} in session {}",
            round,
            me,
            hex::encode(&session_id[..8])
        ))),
    }
}

/// In-memory relay for testing
pub mod memory;

pub use memory::MemoryRelay;
