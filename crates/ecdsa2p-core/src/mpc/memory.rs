//! In-memory relay implementation

use super::{async_trait, Relay};
use crate::{Error, PartyId, Result, SessionId};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;

type Mailbox = (SessionId, u32, PartyId);

/// In-memory message relay shared by both parties of a process.
///
/// Cloning yields another handle onto the same mailboxes.
#[derive(Clone)]
pub struct MemoryRelay {
    /// Pending messages: (session_id, round, to) -> queue of message bytes
    mailboxes: Arc<DashMap<Mailbox, VecDeque<Vec<u8>>>>,
    /// Wakes receivers when anything is delivered
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            mailboxes: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Number of undelivered messages across all sessions
    pub fn pending(&self) -> usize {
        self.mailboxes.iter().map(|entry| entry.value().len()).sum()
    }

    fn take(&self, mailbox: &Mailbox) -> Option<Vec<u8>> {
        let mut queue = self.mailboxes.get_mut(mailbox)?;
        let bytes = queue.pop_front();
        let empty = queue.is_empty();
        drop(queue);
        if empty {
            self.mailboxes.remove_if(mailbox, |_, q| q.is_empty());
        }
        bytes
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn send<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()> {
        let bytes = serialize(message)?;

        self.mailboxes
            .entry((*session_id, round, to))
            .or_default()
            .push_back(bytes);

        let _ = self.notify.send(());
        Ok(())
    }

    async fn receive<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        me: PartyId,
    ) -> Result<T> {
        let mut rx = self.notify.subscribe();
        let mailbox = (*session_id, round, me);

        loop {
            if let Some(bytes) = self.take(&mailbox) {
                return deserialize(&bytes);
            }

            // Wait for a delivery, polling in case the notification was missed
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => continue,
            }
        }
    }

    async fn close_session(&self, session_id: &SessionId, me: PartyId) -> Result<usize> {
        let mut dropped = 0;
        self.mailboxes.retain(|(session, _, to), queue| {
            let stale = session == session_id && *to == me;
            if stale {
                dropped += queue.len();
            }
            !stale
        });
        Ok(dropped)
    }
}
