use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

use crate::messaging::Frame;
use crate::types::Result;

/// Lifecycle state of the single logical stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Owns the writable half of the stream connection and the connection state.
///
/// The readable half lives in the client's read task; everything outbound
/// (user sends, heartbeats, heartbeat replies) funnels through here.
pub struct ConnectionManager {
    writer: RwLock<Option<WsSink>>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            writer: RwLock::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Install the write sink after a successful handshake.
    pub async fn set_writer(&self, writer: WsSink) {
        *self.writer.write().await = Some(writer);
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != new_state {
            tracing::debug!(from = ?*state, to = ?new_state, "connection state transition");
        }
        *state = new_state;
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Transmit a frame. Only succeeds while Connected; any other state or a
    /// write failure reports `false` instead of erroring, so callers can
    /// treat a dropped send as a non-event.
    pub async fn send_frame(&self, frame: &Frame) -> bool {
        if !self.is_connected().await {
            tracing::debug!(
                frame_type = %frame.frame_type,
                "dropping send while not connected"
            );
            return false;
        }

        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("could not serialize outbound frame: {}", e);
                return false;
            }
        };

        let mut writer = self.writer.write().await;
        let Some(ws) = writer.as_mut() else {
            return false;
        };
        match ws.send(Message::Text(json.into())).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("websocket write failed: {}", e);
                false
            }
        }
    }

    /// Close the write half gracefully and drop it.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.writer.write().await;
        let result = match writer.as_mut() {
            Some(ws) => ws.close().await.map_err(Into::into),
            None => Ok(()),
        };
        *writer = None;
        result
    }

    /// Drop the writer without the close handshake (unclean teardown).
    pub async fn clear_writer(&self) {
        *self.writer.write().await = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
