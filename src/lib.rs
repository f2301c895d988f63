//! # console-realtime
//!
//! Realtime sync client for the agent operations console: keeps an in-memory
//! view of the agent fleet and its tasks synchronized with the server over a
//! persistent push channel.
//!
//! Three pieces work together:
//!
//! - [`ConsoleClient`] owns the single stream connection: connect/disconnect,
//!   automatic reconnection with capped exponential backoff after unclean
//!   closes, and periodic heartbeats.
//! - [`MessageRouter`](messaging::MessageRouter) parses inbound frames and
//!   dispatches each to the one handler registered for its type, answering
//!   protocol-level heartbeats itself.
//! - [`EntitySync`] reconciles three update sources per entity kind (REST
//!   snapshot loads, push-delivered deltas, and optimistic local mutations)
//!   into one collection under last-write-wins semantics.
//!
//! ## Example
//!
//! ```no_run
//! use console_realtime::{ApiClient, ConsoleClient, ConsoleClientOptions, EntitySync};
//!
//! #[tokio::main]
//! async fn main() -> console_realtime::Result<()> {
//!     let client = ConsoleClient::new(
//!         "wss://console.example.com/api/events",
//!         ConsoleClientOptions::default(),
//!     )?;
//!     let api = ApiClient::new("https://console.example.com", None);
//!
//!     let sync = EntitySync::new();
//!     sync.attach(&client).await;
//!     sync.refresh_tasks(&api).await?;
//!
//!     client.connect().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod sync;
pub mod types;
pub mod websocket;

pub use api::{ApiClient, ApiEnvelope, PaginatedData};
pub use client::{ConnectionState, ConsoleClient, ConsoleClientBuilder, ConsoleClientOptions};
pub use messaging::{Frame, FrameType, MessageRouter};
pub use sync::{Agent, AgentStatus, EntityStore, EntitySync, PendingUpdate, Task, TaskStatus};
pub use types::{ConsoleError, Result};
