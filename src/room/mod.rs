//! Room session core
//!
//! The three stores (presence, history, reactions) and the coordinator
//! that owns them. Nothing outside the coordinator mutates the stores.

pub mod coordinator;
pub mod gateway;
pub mod history;
pub mod presence;
pub mod reactions;

pub use coordinator::RoomCoordinator;
pub use gateway::{BroadcastGateway, ChannelGateway};
pub use history::HistoryStore;
pub use presence::PresenceRegistry;
pub use reactions::{ReactionTable, ToggleOutcome};
