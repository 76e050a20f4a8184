//! Real-time group-chat backend core
//!
//! This library provides the session/room core of a small group-chat
//! service: presence tracking, bounded message history with late-join
//! replay, per-user reaction toggles with aggregate counts, and a room
//! coordinator that serializes all mutations and fans events out through
//! an abstract broadcast gateway. A newline-delimited-JSON TCP transport
//! is included for running the backend standalone.

pub mod error;
pub mod protocol;
pub mod room;
pub mod server;
pub mod storage;

pub use error::{ChatError, Result};
pub use protocol::{ClientEvent, ConnectionId, MessageId, ReactionCounts, ServerEvent};
pub use room::{BroadcastGateway, ChannelGateway, RoomCoordinator};
pub use server::ChatServer;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Chat backend configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Server listen address
    pub bind_addr: std::net::SocketAddr,
    /// Maximum number of messages kept in the in-memory history window
    pub history_capacity: usize,
    /// Maximum number of messages replayed to a joining client
    pub replay_limit: usize,
    /// The set of reaction kinds clients may toggle
    pub reaction_kinds: Vec<String>,
    /// Maximum size of a single inbound event in bytes
    pub max_message_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 5000)),
            history_capacity: 100,
            replay_limit: 50,
            reaction_kinds: vec!["like".to_string(), "heart".to_string(), "laugh".to_string()],
            max_message_size: 64 * 1024,
        }
    }
}

/// A connected user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub connection_id: ConnectionId,
    pub username: String,
    pub connected_at: u64,
}

impl User {
    pub fn new(connection_id: ConnectionId, username: String) -> Self {
        Self {
            connection_id,
            username,
            connected_at: current_timestamp(),
        }
    }
}

/// Who may see a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Delivered and replayed to everyone
    Public,
    /// Delivered and replayed only to the sender and the recipient
    Private { recipient: String },
}

/// A chat message. Immutable once created; `id` is assigned by the
/// history store on append and is strictly increasing in creation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    pub content: String,
    pub created_at: u64,
    pub visibility: Visibility,
    pub is_system: bool,
}

/// Sender name recorded on join/leave notices
pub const SYSTEM_SENDER: &str = "System";

impl Message {
    pub fn new_public(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            sender: sender.into(),
            content: content.into(),
            created_at: current_timestamp(),
            visibility: Visibility::Public,
            is_system: false,
        }
    }

    pub fn new_private(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            sender: sender.into(),
            content: content.into(),
            created_at: current_timestamp(),
            visibility: Visibility::Private {
                recipient: recipient.into(),
            },
            is_system: false,
        }
    }

    pub fn new_system(content: impl Into<String>) -> Self {
        Self {
            id: 0,
            sender: SYSTEM_SENDER.to_string(),
            content: content.into(),
            created_at: current_timestamp(),
            visibility: Visibility::Public,
            is_system: true,
        }
    }

    /// Whether `username` is allowed to see this message: public, sent by
    /// them, or addressed to them. Names are compared case-insensitively,
    /// matching presence uniqueness.
    pub fn is_visible_to(&self, username: &str) -> bool {
        match &self.visibility {
            Visibility::Public => true,
            Visibility::Private { recipient } => {
                let username = username.to_lowercase();
                self.sender.to_lowercase() == username
                    || recipient.to_lowercase() == username
            }
        }
    }
}
