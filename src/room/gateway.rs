//! Broadcast gateway: fire-and-forget event delivery to live connections

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{ConnectionId, ServerEvent};

/// Abstract sink the coordinator fans events out through.
///
/// Delivery is best-effort, at-most-once, and non-blocking: a slow or
/// dead connection must never stall delivery to the others, and events
/// for connections that are no longer live are silently dropped.
pub trait BroadcastGateway: Send + Sync {
    /// Deliver one event to one connection
    fn deliver(&self, target: ConnectionId, event: ServerEvent);

    /// Deliver one event to every live connection
    fn broadcast(&self, event: ServerEvent);
}

/// Gateway backed by one unbounded channel per connection.
///
/// The transport registers each connection to obtain its receiver and
/// drains it from a dedicated writer task, so fan-out to N connections
/// is N independent sends.
#[derive(Debug, Default)]
pub struct ChannelGateway {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ChannelGateway {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return the receiving end of its event
    /// queue. Replaces any previous registration for the same id.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut senders) = self.senders.write() {
            senders.insert(connection_id, tx);
        }
        rx
    }

    /// Drop a connection's event queue; later deliveries to it are discarded
    pub fn unregister(&self, connection_id: ConnectionId) {
        if let Ok(mut senders) = self.senders.write() {
            if senders.remove(&connection_id).is_some() {
                debug!("connection {} unregistered", connection_id);
            }
        }
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.senders.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl BroadcastGateway for ChannelGateway {
    fn deliver(&self, target: ConnectionId, event: ServerEvent) {
        let Ok(senders) = self.senders.read() else {
            return;
        };
        if let Some(tx) = senders.get(&target) {
            // A closed receiver means the connection died mid-delivery;
            // that is not an error.
            let _ = tx.send(event);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        let Ok(senders) = self.senders.read() else {
            return;
        };
        for tx in senders.values() {
            let _ = tx.send(event.clone());
        }
    }
}
