use tokio::task::JoinHandle;

/// Owns at most one background task (socket reader, heartbeat timer,
/// reconnect schedule). Spawning into an occupied slot aborts the task that
/// held it, so a reconnected client can never run two heartbeat timers at
/// once; a stale timer surviving teardown could also resurrect a connection
/// the caller believes is dead, so every spawned task must live in a slot.
pub struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawn a task into the slot, aborting the previous occupant.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.abort();
        self.handle = Some(tokio::spawn(future));
    }

    /// Abort the occupant, if any, without waiting for it to wind down.
    pub fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the slot holds a task that has not yet finished.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}
