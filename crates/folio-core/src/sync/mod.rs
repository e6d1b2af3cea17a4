//! Live sync with the event source
//!
//! Keeps one WebSocket connection to a socket.io server open and feeds every
//! `action` event it pushes into the [`Store`](crate::store::Store).
//!
//! ## Protocol
//!
//! 1. Connect via WebSocket to `/socket.io/?EIO=<n>&transport=websocket`
//! 2. Receive the Engine.IO open handshake
//! 3. Join the default namespace (the client sends `40` on protocol v4)
//! 4. Dispatch each `action` event; answer or send heartbeats
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new();
//! let handle = spawn_connection(ConnectionConfig::from_config(&config)?, store.clone());
//! let mut rx = store.subscribe();
//! ```

mod connection;
mod message;

pub use connection::{
    spawn_connection, ConnectionCommand, ConnectionConfig, ConnectionHandle, ConnectionStatus,
    MAX_PENDING,
};
pub use message::{
    is_server_action, EnginePacket, Handshake, Inbound, Outbound, SocketPacket, ACTION_EVENT,
    DEFAULT_NAMESPACE, SERVER_PREFIX,
};
