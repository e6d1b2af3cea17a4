//! Live state container
//!
//! The `Store` owns the current `AppState` snapshot. It is the only writer:
//! events go in through `dispatch`, and everyone else reads snapshots
//! through `subscribe`.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new();
//! let mut rx = store.subscribe();
//!
//! store.dispatch(Event::user_count(5));
//!
//! rx.changed().await?;
//! assert_eq!(rx.borrow().visitor_count(), Some(5));
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::Config;
use crate::models::{apply, Action, AppState, Event};

/// Owner of the live application state
///
/// Cloning the store yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct Store {
    /// Current snapshot, broadcast to subscribers on every transition
    state: Arc<watch::Sender<AppState>>,
    /// Log each resulting snapshot at debug level
    log_transitions: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store holding the initial state
    pub fn new() -> Self {
        Self::with_state(AppState::new())
    }

    /// Create a store seeded with a given snapshot
    pub fn with_state(state: AppState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            state: Arc::new(tx),
            log_transitions: false,
        }
    }

    /// Create a store configured from application settings
    pub fn from_config(config: &Config) -> Self {
        Self::new().with_transition_logging(config.log_transitions)
    }

    /// Enable or disable logging of every resulting snapshot
    pub fn with_transition_logging(mut self, enabled: bool) -> Self {
        self.log_transitions = enabled;
        self
    }

    /// Apply one event and publish the resulting snapshot
    ///
    /// Subscribers are notified on every dispatch, including events that
    /// leave the state unchanged. Concurrent dispatches are serialized.
    pub fn dispatch(&self, event: Event) -> AppState {
        let mut next = AppState::default();
        self.state.send_modify(|state| {
            next = apply(state, &event);
            *state = next.clone();
        });

        match &event {
            Event::Unknown { kind } => trace!("Ignoring event of type {:?}", kind),
            _ => trace!("Applied {} event", event.kind()),
        }

        if self.log_transitions {
            debug!(state = ?next, "new client state");
        }

        next
    }

    /// Decode an action and dispatch it
    pub fn dispatch_action(&self, action: &Action) -> AppState {
        self.dispatch(Event::from_action(action))
    }

    /// Get a copy of the current snapshot
    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }
}
