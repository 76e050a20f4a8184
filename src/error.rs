//! Error handling for the chat backend

use std::fmt;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat backend error types
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Requested username is already held by a live connection
    UsernameTaken(String),
    /// Reaction kind outside the configured set
    InvalidReaction(String),
    /// Durable store failure (non-fatal, in-memory state still advances)
    Persistence(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Network-related errors
    Network(String),
    /// Connection errors
    Connection(String),
    /// Invalid message format
    InvalidMessage(String),
    /// Server internal error
    Internal(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::UsernameTaken(_) => 1000,
            ChatError::InvalidReaction(_) => 1001,
            ChatError::Persistence(_) => 1002,
            ChatError::Serialization(_) => 1003,
            ChatError::Network(_) => 1004,
            ChatError::Connection(_) => 1005,
            ChatError::InvalidMessage(_) => 1006,
            ChatError::Internal(_) => 1007,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::UsernameTaken(msg) => msg,
            ChatError::InvalidReaction(msg) => msg,
            ChatError::Persistence(msg) => msg,
            ChatError::Serialization(msg) => msg,
            ChatError::Network(msg) => msg,
            ChatError::Connection(msg) => msg,
            ChatError::InvalidMessage(msg) => msg,
            ChatError::Internal(msg) => msg,
        }
    }

    /// Create a username-taken error
    pub fn username_taken<T: Into<String>>(username: T) -> Self {
        ChatError::UsernameTaken(username.into())
    }

    /// Create an invalid-reaction error
    pub fn invalid_reaction<T: Into<String>>(kind: T) -> Self {
        ChatError::InvalidReaction(kind.into())
    }

    /// Create a persistence error
    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        ChatError::Persistence(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ChatError::Serialization(msg.into())
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    /// Create a connection error
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        ChatError::Connection(msg.into())
    }

    /// Create an invalid message error
    pub fn invalid_message<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidMessage(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::UsernameTaken(name) => write!(f, "Username already taken: {}", name),
            ChatError::InvalidReaction(kind) => write!(f, "Unknown reaction kind: {}", kind),
            ChatError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            ChatError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ChatError::Network(msg) => write!(f, "Network error: {}", msg),
            ChatError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ChatError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Internal(format!("{}", err))
    }
}
