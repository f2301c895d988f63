mod builder;
mod connection;
mod core;
mod state;

pub use builder::{ConsoleClientBuilder, ConsoleClientOptions};
pub use connection::{ConnectionManager, ConnectionState};
pub use core::ConsoleClient;
pub use state::ClientState;
