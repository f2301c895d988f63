use thiserror::Error;

/// Errors surfaced by the realtime console client.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid client configuration (bad stream URL, bad protocol list, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error from the REST boundary
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The REST boundary answered with an unsuccessful envelope
    #[error("api error: {0}")]
    Api(String),
}

/// Convenience type alias for `Result<T, ConsoleError>`.
pub type Result<T> = std::result::Result<T, ConsoleError>;
