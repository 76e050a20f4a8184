//! Bounded message history with late-join replay

use std::collections::VecDeque;

use crate::Message;
use crate::protocol::MessageId;

/// Ordered log of the most recent messages.
///
/// Holds at most `capacity` messages; the oldest is evicted first once
/// over capacity. Message ids are assigned here, strictly increasing in
/// creation order, and are never reused even after eviction.
#[derive(Debug)]
pub struct HistoryStore {
    messages: VecDeque<Message>,
    capacity: usize,
    next_id: MessageId,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Append a message to the tail, assigning the next id if the message
    /// does not already carry one (restored messages keep theirs), and
    /// evict from the head while over capacity. Never fails.
    pub fn append(&mut self, mut message: Message) -> Message {
        if message.id == 0 {
            message.id = self.next_id;
            self.next_id += 1;
        } else if message.id >= self.next_id {
            // Keep ids monotonic past restored messages
            self.next_id = message.id + 1;
        }

        self.messages.push_back(message.clone());
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }

        message
    }

    /// Up to `limit` most recent messages visible to `username`, returned
    /// oldest-first for replay. Private messages not involving `username`
    /// are filtered out even though they remain in the shared window.
    pub fn recent_visible_to(&self, username: &str, limit: usize) -> Vec<Message> {
        let mut replay: Vec<Message> = self
            .messages
            .iter()
            .rev()
            .filter(|m| m.is_visible_to(username))
            .take(limit)
            .cloned()
            .collect();
        replay.reverse();
        replay
    }

    /// Number of messages currently in the window
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
