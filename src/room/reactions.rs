//! Per-message reaction toggles with aggregate counts

use std::collections::{HashMap, HashSet};

use crate::error::{ChatError, Result};
use crate::protocol::{MessageId, ReactionCounts};

/// Result of toggling one reaction record
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    /// Whether the record is active after the toggle
    pub active: bool,
    /// Aggregate counts for the message after the toggle
    pub counts: ReactionCounts,
}

/// Table of active `(message, user, kind)` reaction records.
///
/// Toggle is the only mutation path: toggling an absent record inserts
/// it, toggling a present one removes it. This collapses "client
/// double-fired the event" and "user removed their reaction" into one
/// self-inverse operation, so duplicate clicks can never double-count.
/// Aggregates are maintained incrementally rather than recomputed by
/// scanning the records.
#[derive(Debug)]
pub struct ReactionTable {
    kinds: Vec<String>,
    records: HashSet<(MessageId, String, String)>,
    counts: HashMap<MessageId, ReactionCounts>,
}

impl ReactionTable {
    pub fn new(kinds: Vec<String>) -> Self {
        Self {
            kinds,
            records: HashSet::new(),
            counts: HashMap::new(),
        }
    }

    /// Toggle the `(message_id, username, kind)` record and return the
    /// message's recomputed aggregate.
    ///
    /// Kinds outside the configured set are rejected with
    /// [`ChatError::InvalidReaction`] and mutate nothing; accepting them
    /// would destabilize the [`ReactionCounts`] shape clients rely on.
    pub fn toggle(
        &mut self,
        message_id: MessageId,
        username: &str,
        kind: &str,
    ) -> Result<ToggleOutcome> {
        if !self.kinds.iter().any(|k| k == kind) {
            return Err(ChatError::invalid_reaction(kind));
        }

        let zero = self.zero_counts();
        let key = (message_id, username.to_string(), kind.to_string());
        let counts = self.counts.entry(message_id).or_insert_with(|| zero);

        let active = if self.records.contains(&key) {
            self.records.remove(&key);
            if let Some(count) = counts.get_mut(kind) {
                *count = count.saturating_sub(1);
            }
            false
        } else {
            self.records.insert(key);
            if let Some(count) = counts.get_mut(kind) {
                *count += 1;
            }
            true
        };

        let counts = counts.clone();
        if counts.values().all(|&c| c == 0) {
            self.counts.remove(&message_id);
        }

        Ok(ToggleOutcome { active, counts })
    }

    /// Aggregate counts for one message, zero-filled over all kinds
    pub fn counts_for(&self, message_id: MessageId) -> ReactionCounts {
        self.counts
            .get(&message_id)
            .cloned()
            .unwrap_or_else(|| self.zero_counts())
    }

    /// Aggregates for every message with at least one active reaction,
    /// regardless of whether the message is still in the history window.
    /// Used for full-state replay to a joining client.
    pub fn counts_for_all(&self) -> HashMap<MessageId, ReactionCounts> {
        self.counts.clone()
    }

    fn zero_counts(&self) -> ReactionCounts {
        self.kinds.iter().map(|k| (k.clone(), 0)).collect()
    }
}
