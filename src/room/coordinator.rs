//! Room coordinator: single-writer orchestration of the session core
//!
//! All mutating operations serialize on one lock so the three stores are
//! never observed in a torn intermediate state, and join replay is
//! snapshotted inside the same critical section as the join itself.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::protocol::{ConnectionId, MessageId, ServerEvent};
use crate::room::gateway::BroadcastGateway;
use crate::room::history::HistoryStore;
use crate::room::presence::PresenceRegistry;
use crate::room::reactions::ReactionTable;
use crate::storage::MessageStore;
use crate::{ChatConfig, Message, User};

/// The stores owned by the coordinator, guarded together
struct RoomState {
    presence: PresenceRegistry,
    history: HistoryStore,
    reactions: ReactionTable,
}

/// Orchestrates one chat room.
///
/// Owns presence, history, and reactions behind a single mutation lock;
/// no other component mutates them. Events are delivered through the
/// [`BroadcastGateway`] with fire-and-forget semantics, so holding the
/// lock across delivery never blocks on a peer. Durable-store failures
/// are logged and the in-memory state advances regardless; the room
/// favors availability over durability.
pub struct RoomCoordinator {
    state: Mutex<RoomState>,
    gateway: Arc<dyn BroadcastGateway>,
    store: Arc<dyn MessageStore>,
    replay_limit: usize,
}

impl RoomCoordinator {
    /// Build a coordinator, warming history and reactions from the
    /// durable store when one has state to offer.
    pub fn new(
        config: &ChatConfig,
        gateway: Arc<dyn BroadcastGateway>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let mut history = HistoryStore::new(config.history_capacity);
        let mut reactions = ReactionTable::new(config.reaction_kinds.clone());

        match store.list_recent_messages(config.history_capacity, None) {
            Ok(messages) => {
                for message in messages {
                    history.append(message);
                }
            }
            Err(e) => warn!("history not restored: {}", e),
        }
        match store.list_all_reactions() {
            Ok(records) => {
                for record in records {
                    // Records toggle on from empty; kinds dropped from the
                    // configured set since they were stored are skipped.
                    if let Err(e) =
                        reactions.toggle(record.message_id, &record.username, &record.kind)
                    {
                        debug!("stored reaction skipped: {}", e);
                    }
                }
            }
            Err(e) => warn!("reactions not restored: {}", e),
        }

        Self {
            state: Mutex::new(RoomState {
                presence: PresenceRegistry::new(),
                history,
                reactions,
            }),
            gateway,
            store,
            replay_limit: config.replay_limit,
        }
    }

    /// Register a joining connection.
    ///
    /// On a taken username the requester alone gets an error event and
    /// nothing changes. Otherwise the joining connection receives the
    /// visible history window and the full reaction snapshot first, so
    /// its own join notice is the first live event it sees, and everyone
    /// receives the notice plus the updated user list.
    pub async fn handle_join(&self, connection_id: ConnectionId, username: &str) -> Result<User> {
        let mut state = self.state.lock().await;

        let user = match state.presence.join(connection_id, username) {
            Ok(user) => user,
            Err(e) => {
                debug!("join rejected for '{}': {}", username, e);
                self.gateway.deliver(
                    connection_id,
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        if let Err(e) = self.store.find_or_create_user(&user.username) {
            warn!("user '{}' not persisted: {}", user.username, e);
        }

        for message in state
            .history
            .recent_visible_to(&user.username, self.replay_limit)
        {
            self.gateway
                .deliver(connection_id, ServerEvent::MessageReceived(message));
        }
        self.gateway.deliver(
            connection_id,
            ServerEvent::AllReactionsLoaded {
                reactions: state.reactions.counts_for_all(),
            },
        );

        let notice = self.append(
            &mut state,
            Message::new_system(format!("{} joined the chat", user.username)),
        );
        self.gateway.broadcast(ServerEvent::MessageReceived(notice));
        self.gateway.broadcast(ServerEvent::UserListUpdated {
            usernames: state.presence.usernames(),
        });

        info!("user '{}' joined", user.username);
        Ok(user)
    }

    /// Broadcast a public message from `sender` to the whole room
    pub async fn handle_send(&self, sender: &str, content: &str) -> Message {
        let mut state = self.state.lock().await;
        let message = self.append(&mut state, Message::new_public(sender, content));
        self.gateway
            .broadcast(ServerEvent::MessageReceived(message.clone()));
        message
    }

    /// Store and deliver a private message.
    ///
    /// The sender's connection always gets a copy so their client shows
    /// the sent message. An offline recipient gets no live delivery, but
    /// the message is stored and replays when they next join.
    pub async fn handle_send_private(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
    ) -> Message {
        let mut state = self.state.lock().await;
        let message = self.append(&mut state, Message::new_private(sender, recipient, content));

        let recipient_conn = state.presence.connection_of(recipient);
        if let Some(conn) = recipient_conn {
            self.gateway
                .deliver(conn, ServerEvent::MessageReceived(message.clone()));
        }
        if let Some(conn) = state.presence.connection_of(sender) {
            if recipient_conn != Some(conn) {
                self.gateway
                    .deliver(conn, ServerEvent::MessageReceived(message.clone()));
            }
        }

        message
    }

    /// Toggle `username`'s reaction on a message and broadcast the new
    /// aggregate. Message visibility is deliberately not checked here:
    /// reactions are global, not visibility-scoped.
    pub async fn handle_react(&self, message_id: MessageId, username: &str, kind: &str) {
        let mut state = self.state.lock().await;

        match state.reactions.toggle(message_id, username, kind) {
            Ok(outcome) => {
                let persisted = if outcome.active {
                    self.store.insert_reaction(message_id, username, kind)
                } else {
                    self.store.delete_reaction(message_id, username, kind)
                };
                if let Err(e) = persisted {
                    warn!("reaction on message {} not persisted: {}", message_id, e);
                }

                self.gateway.broadcast(ServerEvent::ReactionsUpdated {
                    message_id,
                    counts: outcome.counts,
                });
            }
            Err(e @ ChatError::InvalidReaction(_)) => {
                debug!("reaction rejected for '{}': {}", username, e);
                if let Some(conn) = state.presence.connection_of(username) {
                    self.gateway.deliver(
                        conn,
                        ServerEvent::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
            Err(e) => warn!("reaction toggle failed: {}", e),
        }
    }

    /// Remove a departing connection. Unknown connections are a silent
    /// no-op; otherwise everyone gets a leave notice and the updated
    /// user list.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) -> Option<User> {
        let mut state = self.state.lock().await;

        let user = state.presence.leave(connection_id)?;

        let notice = self.append(
            &mut state,
            Message::new_system(format!("{} left the chat", user.username)),
        );
        self.gateway.broadcast(ServerEvent::MessageReceived(notice));
        self.gateway.broadcast(ServerEvent::UserListUpdated {
            usernames: state.presence.usernames(),
        });

        info!("user '{}' left", user.username);
        Some(user)
    }

    /// Snapshot of live usernames in join order
    pub async fn usernames(&self) -> Vec<String> {
        self.state.lock().await.presence.usernames()
    }

    /// Number of live users
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.presence.len()
    }

    /// Append to history and mirror to the durable store; store failures
    /// degrade to in-memory only.
    fn append(&self, state: &mut RoomState, message: Message) -> Message {
        let message = state.history.append(message);
        if let Err(e) = self.store.insert_message(&message) {
            warn!("message {} not persisted: {}", message.id, e);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, NullStore};
    use std::sync::Mutex as StdMutex;

    /// Gateway that records every delivery for assertions. `None` targets
    /// are broadcasts.
    #[derive(Default)]
    struct RecordingGateway {
        events: StdMutex<Vec<(Option<ConnectionId>, ServerEvent)>>,
    }

    impl RecordingGateway {
        fn events(&self) -> Vec<(Option<ConnectionId>, ServerEvent)> {
            self.events.lock().unwrap().clone()
        }

        fn events_for(&self, conn: ConnectionId) -> Vec<ServerEvent> {
            self.events()
                .into_iter()
                .filter(|(target, _)| *target == Some(conn) || target.is_none())
                .map(|(_, event)| event)
                .collect()
        }

        fn clear(&self) {
            self.events.lock().unwrap().clear();
        }
    }

    impl BroadcastGateway for RecordingGateway {
        fn deliver(&self, target: ConnectionId, event: ServerEvent) {
            self.events.lock().unwrap().push((Some(target), event));
        }

        fn broadcast(&self, event: ServerEvent) {
            self.events.lock().unwrap().push((None, event));
        }
    }

    fn room() -> (Arc<RecordingGateway>, RoomCoordinator) {
        let gateway = Arc::new(RecordingGateway::default());
        let coordinator = RoomCoordinator::new(
            &ChatConfig::default(),
            gateway.clone(),
            Arc::new(MemoryStore::new()),
        );
        (gateway, coordinator)
    }

    fn is_message(event: &ServerEvent, content: &str) -> bool {
        matches!(event, ServerEvent::MessageReceived(m) if m.content == content)
    }

    #[tokio::test]
    async fn test_duplicate_join_errors_requester_only() {
        let (gateway, room) = room();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        room.handle_join(first, "alice").await.unwrap();
        gateway.clear();

        let err = room.handle_join(second, "ALICE").await.unwrap_err();
        assert!(matches!(err, ChatError::UsernameTaken(_)));
        assert_eq!(room.usernames().await, vec!["alice"]);

        let events = gateway.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Some(second));
        assert!(matches!(events[0].1, ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_join_event_ordering() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        room.handle_send("alice", "hi").await;
        room.handle_react(2, "alice", "like").await;
        gateway.clear();

        let bob = ConnectionId::new();
        room.handle_join(bob, "bob").await.unwrap();

        let seen = gateway.events_for(bob);
        // Backfill first: replayed history oldest-first, then the full
        // reaction snapshot, then the live join notice and user list.
        assert!(is_message(&seen[0], "alice joined the chat"));
        assert!(is_message(&seen[1], "hi"));
        assert!(matches!(seen[2], ServerEvent::AllReactionsLoaded { .. }));
        assert!(is_message(&seen[3], "bob joined the chat"));
        assert!(matches!(
            &seen[4],
            ServerEvent::UserListUpdated { usernames } if *usernames == vec!["alice", "bob"]
        ));
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_react_toggle_and_disconnect_flow() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        room.handle_join(bob, "bob").await.unwrap();

        let hi = room.handle_send("alice", "hi").await;
        gateway.clear();

        room.handle_react(hi.id, "bob", "like").await;
        let events = gateway.events();
        assert!(matches!(
            &events[0],
            (None, ServerEvent::ReactionsUpdated { message_id, counts })
                if *message_id == hi.id
                    && counts["like"] == 1
                    && counts["heart"] == 0
                    && counts["laugh"] == 0
        ));

        gateway.clear();
        room.handle_react(hi.id, "bob", "like").await;
        let events = gateway.events();
        assert!(matches!(
            &events[0],
            (None, ServerEvent::ReactionsUpdated { counts, .. })
                if counts.values().all(|&c| c == 0)
        ));

        gateway.clear();
        room.handle_disconnect(alice).await.unwrap();
        assert_eq!(room.usernames().await, vec!["bob"]);
        let events = gateway.events();
        assert!(matches!(
            &events[1],
            (None, ServerEvent::UserListUpdated { usernames }) if *usernames == vec!["bob"]
        ));
    }

    #[tokio::test]
    async fn test_private_message_delivery_and_isolation() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let carol = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        room.handle_join(bob, "bob").await.unwrap();
        room.handle_join(carol, "carol").await.unwrap();
        gateway.clear();

        room.handle_send_private("alice", "bob", "psst").await;

        let events = gateway.events();
        let targets: Vec<_> = events.iter().map(|(target, _)| *target).collect();
        assert_eq!(targets, vec![Some(bob), Some(alice)]);
        assert!(events.iter().all(|(_, e)| is_message(e, "psst")));
    }

    #[tokio::test]
    async fn test_private_message_to_offline_recipient_replays_later() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        gateway.clear();

        room.handle_send_private("alice", "bob", "you there?").await;

        // No recipient online: only the sender's copy goes out live
        let events = gateway.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Some(alice));

        let bob = ConnectionId::new();
        room.handle_join(bob, "bob").await.unwrap();
        let replayed = gateway.events_for(bob);
        assert!(replayed.iter().any(|e| is_message(e, "you there?")));
    }

    #[tokio::test]
    async fn test_private_message_recipient_matched_case_insensitively() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        room.handle_join(bob, "bob").await.unwrap();
        gateway.clear();

        // Addressed as "BOB" but "bob" is the live user: same name under
        // the presence case discipline, so it both delivers live and
        // stays visible in bob's replay.
        room.handle_send_private("alice", "BOB", "psst").await;

        let targets: Vec<_> = gateway.events().iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec![Some(bob), Some(alice)]);

        room.handle_disconnect(bob).await.unwrap();
        gateway.clear();
        let bob2 = ConnectionId::new();
        room.handle_join(bob2, "bob").await.unwrap();
        let replayed = gateway.events_for(bob2);
        assert!(replayed.iter().any(|e| is_message(e, "psst")));
    }

    #[tokio::test]
    async fn test_private_message_to_self_delivered_once() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        gateway.clear();

        room.handle_send_private("alice", "alice", "note to self").await;
        assert_eq!(gateway.events().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_reaction_errors_reactor_only() {
        let (gateway, room) = room();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        room.handle_join(bob, "bob").await.unwrap();
        let msg = room.handle_send("alice", "hi").await;
        gateway.clear();

        room.handle_react(msg.id, "bob", "sparkles").await;

        let events = gateway.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Some(bob));
        assert!(matches!(events[0].1, ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_connection_is_silent() {
        let (gateway, room) = room();
        room.handle_join(ConnectionId::new(), "alice").await.unwrap();
        gateway.clear();

        assert!(room.handle_disconnect(ConnectionId::new()).await.is_none());
        assert!(gateway.events().is_empty());
        assert_eq!(room.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_in_memory() {
        struct FailingStore;

        impl MessageStore for FailingStore {
            fn insert_message(&self, _message: &Message) -> Result<()> {
                Err(ChatError::persistence("db offline"))
            }
            fn insert_reaction(&self, _: MessageId, _: &str, _: &str) -> Result<()> {
                Err(ChatError::persistence("db offline"))
            }
            fn delete_reaction(&self, _: MessageId, _: &str, _: &str) -> Result<()> {
                Err(ChatError::persistence("db offline"))
            }
            fn find_or_create_user(&self, _: &str) -> Result<u64> {
                Err(ChatError::persistence("db offline"))
            }
            fn list_recent_messages(
                &self,
                _: usize,
                _: Option<&str>,
            ) -> Result<Vec<Message>> {
                Err(ChatError::persistence("db offline"))
            }
            fn list_all_reactions(&self) -> Result<Vec<crate::storage::StoredReaction>> {
                Err(ChatError::persistence("db offline"))
            }
        }

        let gateway = Arc::new(RecordingGateway::default());
        let room = RoomCoordinator::new(
            &ChatConfig::default(),
            gateway.clone(),
            Arc::new(FailingStore),
        );

        let alice = ConnectionId::new();
        room.handle_join(alice, "alice").await.unwrap();
        let msg = room.handle_send("alice", "still works").await;
        room.handle_react(msg.id, "alice", "like").await;

        // Chat stays fully usable; no client ever sees a store error
        assert_eq!(room.usernames().await, vec!["alice"]);
        assert!(
            gateway
                .events()
                .iter()
                .all(|(_, e)| !matches!(e, ServerEvent::Error { .. }))
        );
    }

    #[tokio::test]
    async fn test_state_restored_from_store() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let config = ChatConfig::default();

        {
            let room =
                RoomCoordinator::new(&config, gateway.clone(), store.clone());
            let msg = room.handle_send("alice", "before restart").await;
            room.handle_react(msg.id, "alice", "heart").await;
        }

        // A fresh coordinator over the same store sees the old state
        let room = RoomCoordinator::new(&config, gateway.clone(), store);
        gateway.clear();
        let bob = ConnectionId::new();
        room.handle_join(bob, "bob").await.unwrap();

        let seen = gateway.events_for(bob);
        assert!(is_message(&seen[0], "before restart"));
        assert!(matches!(
            &seen[1],
            ServerEvent::AllReactionsLoaded { reactions }
                if reactions.values().any(|c| c["heart"] == 1)
        ));
    }

    #[tokio::test]
    async fn test_null_store_deployment() {
        let gateway = Arc::new(RecordingGateway::default());
        let room = RoomCoordinator::new(
            &ChatConfig::default(),
            gateway.clone(),
            Arc::new(NullStore),
        );

        room.handle_join(ConnectionId::new(), "alice").await.unwrap();
        room.handle_send("alice", "hi").await;
        assert_eq!(room.user_count().await, 1);
    }
}
