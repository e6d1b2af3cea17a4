//! folio Core Library
//!
//! This crate provides the live state behind the folio site: the visitor
//! count, the active donation banner and the poll results pushed by a
//! remote socket.io event source.
//!
//! # Architecture
//!
//! - **Store**: sole owner of the current `AppState` snapshot; subscribers
//!   get every new snapshot through a watch channel
//! - **Sync**: one persistent WebSocket connection whose actions are
//!   dispatched into the store in delivery order
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Store::from_config(&config);
//! let handle = spawn_connection(ConnectionConfig::from_config(&config)?, store.clone());
//!
//! let mut rx = store.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("{} visitors", rx.borrow().count);
//! }
//! ```
//!
//! # Modules
//!
//! - `models`: State snapshot, actions, events and the transition
//! - `store`: State container and subscriptions
//! - `sync`: Wire codec and connection task
//! - `config`: Application configuration
//! - `error`: Typed errors

pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;

pub use config::{Config, EngineProtocol};
pub use error::{ConfigError, ProtocolError};
pub use models::{apply, Action, AppState, Donation, Event, Payload, PollResult};
pub use store::Store;
