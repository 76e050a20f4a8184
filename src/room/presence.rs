//! Presence registry: live connection <-> username tracking

use crate::User;
use crate::error::{ChatError, Result};
use crate::protocol::ConnectionId;

/// Registry of currently connected users.
///
/// Usernames are unique case-insensitively among live users only; a
/// disconnected username may be reused. Join (insertion) order is
/// preserved because that is the order clients display the user list in.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: Vec<User>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self { users: Vec::new() }
    }

    /// Register `connection_id` under `username`.
    ///
    /// Fails with [`ChatError::UsernameTaken`] when another live user
    /// holds the name, compared case-insensitively. No state changes on
    /// failure.
    pub fn join(&mut self, connection_id: ConnectionId, username: &str) -> Result<User> {
        let requested = username.to_lowercase();
        if self
            .users
            .iter()
            .any(|u| u.username.to_lowercase() == requested)
        {
            return Err(ChatError::username_taken(username));
        }

        let user = User::new(connection_id, username.to_string());
        self.users.push(user.clone());
        Ok(user)
    }

    /// Remove and return the user owning `connection_id`.
    ///
    /// Unknown connections return `None`; a disconnect racing ahead of a
    /// join must be tolerated silently.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<User> {
        let idx = self
            .users
            .iter()
            .position(|u| u.connection_id == connection_id)?;
        Some(self.users.remove(idx))
    }

    /// Look up the user owning `connection_id`
    pub fn get(&self, connection_id: ConnectionId) -> Option<&User> {
        self.users.iter().find(|u| u.connection_id == connection_id)
    }

    /// Look up the connection of a live user by username.
    ///
    /// Matched case-insensitively, the same discipline [`join`] enforces
    /// uniqueness under.
    ///
    /// [`join`]: PresenceRegistry::join
    pub fn connection_of(&self, username: &str) -> Option<ConnectionId> {
        let wanted = username.to_lowercase();
        self.users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
            .map(|u| u.connection_id)
    }

    /// Snapshot of live usernames in join order
    pub fn usernames(&self) -> Vec<String> {
        self.users.iter().map(|u| u.username.clone()).collect()
    }

    /// Number of live users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
