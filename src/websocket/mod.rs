use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::types::{ConsoleError, Result};

/// Dial the stream endpoint, offering the configured sub-protocols.
pub async fn connect(
    endpoint: &str,
    protocols: &[String],
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let mut request = endpoint.into_client_request()?;

    if !protocols.is_empty() {
        let value = HeaderValue::from_str(&protocols.join(", ")).map_err(|e| {
            ConsoleError::Config(format!("invalid sub-protocol list: {}", e))
        })?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", value);
    }

    let (stream, response) = connect_async(request).await?;
    tracing::debug!(status = %response.status(), "websocket handshake complete");
    Ok(stream)
}
