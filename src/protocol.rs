//! Protocol event types exchanged with clients
//!
//! The logical wire contract of the room core: a small closed set of
//! tagged inbound and outbound events. Uses serde for JSON serialization;
//! the concrete transport framing lives in [`crate::server`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Message;

/// Unique, monotonic, server-assigned message identifier
pub type MessageId = u64;

/// Aggregate reaction counts for one message, keyed by reaction kind.
/// Every configured kind is present, zero counts included, so the shape
/// is stable for clients.
pub type ReactionCounts = BTreeMap<String, u64>;

/// Identifier of one live transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events a client sends to the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Enter the room under `username`
    Join { username: String },
    /// Send a public message to the room
    Send { content: String },
    /// Send a private message to one user
    SendPrivate { recipient: String, content: String },
    /// Toggle a reaction on a message
    React { message_id: MessageId, kind: String },
    /// Leave the room (also implied by connection loss)
    Disconnect,
}

/// Events the room delivers to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// A new or replayed message
    MessageReceived(Message),
    /// The live user list changed (join order preserved)
    UserListUpdated { usernames: Vec<String> },
    /// A user-facing error, delivered only to the originating connection
    Error { message: String },
    /// Reaction counts for one message changed
    ReactionsUpdated {
        message_id: MessageId,
        counts: ReactionCounts,
    },
    /// Full reaction state, sent once to a joining client
    AllReactionsLoaded {
        reactions: HashMap<MessageId, ReactionCounts>,
    },
}
