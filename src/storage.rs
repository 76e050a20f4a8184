//! Durable-store collaborator boundary
//!
//! The room core is correct without durability: store failures are
//! logged by the coordinator and in-memory state advances regardless.
//! [`MemoryStore`] is the reference implementation (and the test
//! double); [`NullStore`] is the store-less deployment.

use std::sync::Mutex;

use crate::Message;
use crate::error::{ChatError, Result};
use crate::protocol::MessageId;

/// A persisted reaction record
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReaction {
    pub message_id: MessageId,
    pub username: String,
    pub kind: String,
}

/// Persistence collaborator for messages, reactions, and users.
///
/// Reactions are keyed by username rather than a store-issued user id,
/// so no id lookup sits in the hot path; `find_or_create_user` exists
/// for durable user records only.
pub trait MessageStore: Send + Sync {
    fn insert_message(&self, message: &Message) -> Result<()>;

    fn insert_reaction(&self, message_id: MessageId, username: &str, kind: &str) -> Result<()>;

    fn delete_reaction(&self, message_id: MessageId, username: &str, kind: &str) -> Result<()>;

    /// Ensure a durable user record exists, returning its store id
    fn find_or_create_user(&self, username: &str) -> Result<u64>;

    /// Up to `limit` most recent messages in creation order, optionally
    /// filtered to those visible to one user
    fn list_recent_messages(&self, limit: usize, visible_to: Option<&str>) -> Result<Vec<Message>>;

    /// Every persisted reaction record
    fn list_all_reactions(&self) -> Result<Vec<StoredReaction>>;
}

/// Store that drops everything: the in-memory-only deployment
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl MessageStore for NullStore {
    fn insert_message(&self, _message: &Message) -> Result<()> {
        Ok(())
    }

    fn insert_reaction(&self, _message_id: MessageId, _username: &str, _kind: &str) -> Result<()> {
        Ok(())
    }

    fn delete_reaction(&self, _message_id: MessageId, _username: &str, _kind: &str) -> Result<()> {
        Ok(())
    }

    fn find_or_create_user(&self, _username: &str) -> Result<u64> {
        Ok(0)
    }

    fn list_recent_messages(
        &self,
        _limit: usize,
        _visible_to: Option<&str>,
    ) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }

    fn list_all_reactions(&self) -> Result<Vec<StoredReaction>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    messages: Vec<Message>,
    reactions: Vec<StoredReaction>,
    users: Vec<String>,
}

/// Process-local store keeping everything in vectors
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryStoreInner>> {
        self.inner
            .lock()
            .map_err(|_| ChatError::persistence("store lock poisoned"))
    }
}

impl MessageStore for MemoryStore {
    fn insert_message(&self, message: &Message) -> Result<()> {
        self.lock()?.messages.push(message.clone());
        Ok(())
    }

    fn insert_reaction(&self, message_id: MessageId, username: &str, kind: &str) -> Result<()> {
        self.lock()?.reactions.push(StoredReaction {
            message_id,
            username: username.to_string(),
            kind: kind.to_string(),
        });
        Ok(())
    }

    fn delete_reaction(&self, message_id: MessageId, username: &str, kind: &str) -> Result<()> {
        self.lock()?.reactions.retain(|r| {
            !(r.message_id == message_id && r.username == username && r.kind == kind)
        });
        Ok(())
    }

    fn find_or_create_user(&self, username: &str) -> Result<u64> {
        let mut inner = self.lock()?;
        if let Some(idx) = inner.users.iter().position(|u| u == username) {
            return Ok(idx as u64 + 1);
        }
        inner.users.push(username.to_string());
        Ok(inner.users.len() as u64)
    }

    fn list_recent_messages(&self, limit: usize, visible_to: Option<&str>) -> Result<Vec<Message>> {
        let inner = self.lock()?;
        let mut recent: Vec<Message> = inner
            .messages
            .iter()
            .rev()
            .filter(|m| visible_to.map_or(true, |user| m.is_visible_to(user)))
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    fn list_all_reactions(&self) -> Result<Vec<StoredReaction>> {
        Ok(self.lock()?.reactions.clone())
    }
}
