//! TCP chat server: newline-delimited JSON transport
//!
//! One concrete transport over the room core. Each accepted connection
//! gets a fresh [`ConnectionId`] and a registration in the
//! [`ChannelGateway`]; a writer task drains its event queue to the
//! socket while the read loop parses [`ClientEvent`] lines and
//! dispatches them to the coordinator.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::ChatConfig;
use crate::error::{ChatError, Result};
use crate::protocol::{ClientEvent, ConnectionId, ServerEvent};
use crate::room::gateway::BroadcastGateway;
use crate::room::{ChannelGateway, RoomCoordinator};
use crate::storage::MessageStore;

/// TCP-fronted chat room
pub struct ChatServer {
    config: ChatConfig,
    gateway: Arc<ChannelGateway>,
    coordinator: Arc<RoomCoordinator>,
}

impl ChatServer {
    /// Create a server over a fresh room backed by `store`
    pub fn new(config: ChatConfig, store: Arc<dyn MessageStore>) -> Self {
        let gateway = Arc::new(ChannelGateway::new());
        let coordinator = Arc::new(RoomCoordinator::new(&config, gateway.clone(), store));
        Self {
            config,
            gateway,
            coordinator,
        }
    }

    /// The room coordinator behind this server
    pub fn coordinator(&self) -> Arc<RoomCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Get server statistics
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            connections: self.gateway.connection_count(),
            users: self.coordinator.user_count().await,
        }
    }

    /// Bind and serve until the listener fails
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("chat server listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            debug!("new connection from {}", addr);

            let gateway = Arc::clone(&self.gateway);
            let coordinator = Arc::clone(&self.coordinator);
            let max_event_size = self.config.max_message_size;
            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, gateway, coordinator, max_event_size).await
                {
                    debug!("connection from {} closed: {}", addr, e);
                }
            });
        }
    }
}

/// Server statistics
#[derive(Debug, Clone, Copy)]
pub struct ServerStats {
    pub connections: usize,
    pub users: usize,
}

async fn handle_connection(
    stream: TcpStream,
    gateway: Arc<ChannelGateway>,
    coordinator: Arc<RoomCoordinator>,
    max_event_size: usize,
) -> Result<()> {
    let connection_id = ConnectionId::new();
    let (reader, mut writer) = stream.into_split();
    let mut events = gateway.register(connection_id);

    // Writer task: drain queued events to the socket as JSON lines. Exits
    // when the queue is unregistered or the peer stops reading.
    let writer_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!("event not serialized: {}", e);
                    continue;
                }
            };
            line.push(b'\n');
            if writer.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let result = read_loop(
        reader,
        connection_id,
        &gateway,
        &coordinator,
        max_event_size,
    )
    .await;

    // Connection loss implies Disconnect
    coordinator.handle_disconnect(connection_id).await;
    gateway.unregister(connection_id);
    let _ = writer_task.await;

    result
}

async fn read_loop<R>(
    reader: R,
    connection_id: ConnectionId,
    gateway: &ChannelGateway,
    coordinator: &RoomCoordinator,
    max_event_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut username: Option<String> = None;

    loop {
        // The buffer is capped before reading: a peer that never sends a
        // newline must not grow memory past the event size limit, so the
        // read itself stops one byte over the cap.
        buf.clear();
        let n = (&mut reader)
            .take(max_event_size as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > max_event_size {
            return Err(ChatError::invalid_message(format!(
                "event too large: over {} bytes",
                max_event_size
            )));
        }
        // No trailing newline within the cap means EOF mid-line; the
        // final partial line is still handled.
        if buf.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let event = match serde_json::from_slice::<ClientEvent>(&buf) {
            Ok(event) => event,
            Err(e) => {
                gateway.deliver(
                    connection_id,
                    ServerEvent::Error {
                        message: ChatError::from(e).to_string(),
                    },
                );
                continue;
            }
        };

        match event {
            ClientEvent::Join {
                username: requested,
            } => {
                if username.is_some() {
                    gateway.deliver(
                        connection_id,
                        ServerEvent::Error {
                            message: "Already joined".to_string(),
                        },
                    );
                    continue;
                }
                if let Ok(user) = coordinator.handle_join(connection_id, &requested).await {
                    username = Some(user.username);
                }
            }
            ClientEvent::Send { content } => {
                let Some(sender) = username.as_deref() else {
                    debug!("send from unjoined connection {} dropped", connection_id);
                    continue;
                };
                // Empty/whitespace filtering is a transport concern; the
                // core accepts any content.
                if content.trim().is_empty() {
                    continue;
                }
                coordinator.handle_send(sender, &content).await;
            }
            ClientEvent::SendPrivate { recipient, content } => {
                let Some(sender) = username.as_deref() else {
                    debug!(
                        "private send from unjoined connection {} dropped",
                        connection_id
                    );
                    continue;
                };
                if content.trim().is_empty() {
                    continue;
                }
                coordinator
                    .handle_send_private(sender, &recipient, &content)
                    .await;
            }
            ClientEvent::React { message_id, kind } => {
                let Some(reactor) = username.as_deref() else {
                    debug!("react from unjoined connection {} dropped", connection_id);
                    continue;
                };
                coordinator.handle_react(message_id, reactor, &kind).await;
            }
            ClientEvent::Disconnect => break,
        }
    }

    Ok(())
}
