use tokio::sync::watch;

use super::connection::ConnectionState;
use crate::infrastructure::{BackoffTimer, TaskSlot};

/// Consolidated mutable state for a client.
/// A single struct behind one lock keeps contention down.
pub struct ClientState {
    /// Socket read task for the current connection.
    pub reader: TaskSlot,

    /// Heartbeat timer for the current connection. Exactly one per client:
    /// establishing a connection replaces (and thereby aborts) the timer
    /// left over from the previous one.
    pub heartbeat: TaskSlot,

    /// Pending reconnect schedule after an unclean close.
    pub reconnect: TaskSlot,

    /// Reconnection schedule; reset on every successful connect.
    pub backoff: BackoffTimer,

    /// Whether the last disconnect was requested locally.
    /// A manual disconnect never triggers reconnection.
    pub was_manual_disconnect: bool,

    /// Publishes connection state transitions to interested watchers
    /// (e.g. a UI banner when realtime updates go terminal).
    pub state_tx: watch::Sender<ConnectionState>,
}

impl ClientState {
    pub fn new(backoff: BackoffTimer, state_tx: watch::Sender<ConnectionState>) -> Self {
        Self {
            reader: TaskSlot::new(),
            heartbeat: TaskSlot::new(),
            reconnect: TaskSlot::new(),
            backoff,
            was_manual_disconnect: false,
            state_tx,
        }
    }

    /// Notify watchers of a state transition. Never fails: watchers may come
    /// and go independently of the connection lifecycle.
    pub fn notify_state_change(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}
