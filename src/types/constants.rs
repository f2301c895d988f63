/// Frame type tags recognized on the wire (magic strings layer)
pub mod frame_types {
    pub const TASK_ASSIGNMENT: &str = "task_assignment";
    pub const TASK_RESULT: &str = "task_result";
    pub const STATUS_UPDATE: &str = "status_update";
    pub const ERROR: &str = "error";
    pub const HEARTBEAT: &str = "heartbeat";
}

/// Default heartbeat interval (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Default base reconnect interval (milliseconds)
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;

/// Default ceiling for the computed reconnect delay (milliseconds)
pub const DEFAULT_RECONNECT_CEILING_MS: u64 = 30_000;

/// Default maximum number of automatic reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
