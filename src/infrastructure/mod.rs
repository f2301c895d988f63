mod backoff;
mod tasks;

pub use backoff::BackoffTimer;
pub use tasks::TaskSlot;
