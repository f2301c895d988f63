use std::sync::Arc;

use futures::stream::{SplitStream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{RwLock, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{ClientState, ConnectionManager, ConnectionState, ConsoleClientBuilder,
    ConsoleClientOptions};
use crate::messaging::{Frame, FrameType, MessageRouter};
use crate::types::Result;

type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Client for the console's realtime event stream.
///
/// Owns one logical stream connection and keeps it alive: automatic
/// reconnection with capped exponential backoff after unclean closes,
/// periodic heartbeats while connected, and frame routing to registered
/// handlers. Explicitly constructed and cheap to clone; every clone shares
/// the same connection, so independent connections (e.g. in tests) come from
/// independently built clients.
///
/// # Example
///
/// ```no_run
/// use console_realtime::{ConsoleClient, ConsoleClientOptions, FrameType};
///
/// # async fn example() -> console_realtime::Result<()> {
/// let client = ConsoleClient::new(
///     "wss://console.example.com/api/events",
///     ConsoleClientOptions::default(),
/// )?;
///
/// client
///     .on_frame(FrameType::StatusUpdate, |frame| {
///         println!("agent update: {}", frame.payload);
///     })
///     .await;
///
/// client.connect().await?;
/// // ...
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConsoleClient {
    pub(crate) endpoint: String,
    pub(crate) options: ConsoleClientOptions,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) router: Arc<MessageRouter>,
    pub(crate) state: Arc<RwLock<ClientState>>,
}

impl ConsoleClient {
    /// Create a client without connecting. Fails on invalid configuration.
    pub fn new(endpoint: impl Into<String>, options: ConsoleClientOptions) -> Result<Self> {
        ConsoleClientBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    /// Establish the stream connection.
    ///
    /// Resolves once the transport reports open; a transport-level error
    /// before open rejects the call and leaves the client Disconnected
    /// without scheduling a retry. Calling while already Connecting or
    /// Connected is a no-op. On open, the reconnect-attempt counter resets
    /// and the heartbeat timer starts.
    pub async fn connect(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if state == ConnectionState::Connected || state == ConnectionState::Connecting {
                return Ok(());
            }
        }
        self.set_state(ConnectionState::Connecting).await;
        tracing::info!(endpoint = %self.endpoint, "connecting to event stream");

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("connection attempt failed: {}", e);
                self.set_state(ConnectionState::Disconnected).await;
                Err(e)
            }
        }
    }

    /// Dial and bring the connection up. On success the state is Connected
    /// with fresh reader and heartbeat tasks; on failure the caller decides
    /// what state to publish (terminal Disconnected for a user-initiated
    /// connect, stay in the retry states for the reconnect schedule).
    async fn establish(&self) -> Result<()> {
        let stream = crate::websocket::connect(&self.endpoint, &self.options.protocols).await?;

        let (write_half, read_half) = stream.split();
        self.connection.set_writer(write_half).await;

        {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = false;
            state.backoff.reset();
        }
        self.set_state(ConnectionState::Connected).await;

        // One reader and one heartbeat per connection. The slots abort any
        // survivors from the previous connection, so a reconnect completing
        // between heartbeat ticks cannot stack a second timer.
        {
            let mut state = self.state.write().await;
            state.reader.spawn(self.reader_loop(read_half));
            state.heartbeat.spawn(self.heartbeat_loop());
        }

        tracing::info!("connected to event stream");
        Ok(())
    }

    /// Tear down cleanly. Idempotent: safe on an already-disconnected
    /// client. Aborts every pending timer and task so nothing can resurrect
    /// the connection afterwards, clears the handler table, and resets the
    /// reconnect counter.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let state = self.connection.state().await;
            if state == ConnectionState::Disconnected {
                return Ok(());
            }
        }
        tracing::info!("disconnecting from event stream");

        {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = true;
            state.reader.abort();
            state.heartbeat.abort();
            state.reconnect.abort();
            state.backoff.reset();
        }
        self.router.clear().await;

        let close_result = self.connection.close().await;
        self.set_state(ConnectionState::Disconnected).await;
        close_result?;

        tracing::info!("disconnected from event stream");
        Ok(())
    }

    /// Transmit a frame. Returns `true` only when the client is Connected
    /// and the write succeeded; otherwise the frame is dropped silently.
    /// Sends are never queued for later.
    pub async fn send(&self, frame: &Frame) -> bool {
        self.connection.send_frame(frame).await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    /// Watch connection state transitions, e.g. to surface a "realtime
    /// updates unavailable" banner once reconnection goes terminal.
    pub async fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.read().await.state_tx.subscribe()
    }

    /// Register the single handler for a frame type (replaces any prior one).
    pub async fn on_frame<F>(&self, frame_type: FrameType, handler: F)
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        self.router.on_frame(frame_type, handler).await;
    }

    /// Remove the handler for a frame type.
    pub async fn off_frame(&self, frame_type: &FrameType) {
        self.router.off_frame(frame_type).await;
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;
        self.state.read().await.notify_state_change(new_state);
    }

    /// Inbound half of the connection: parse and route text frames, watch
    /// for the close that decides between clean teardown and reconnection.
    fn reader_loop(
        &self,
        mut read_half: WsStream,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let client = self.clone();
        async move {
            tracing::debug!("read task started");
            while let Some(msg_result) = read_half.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        client.router.handle_raw(&text).await;
                    }
                    Ok(Message::Close(close_frame)) => {
                        let clean = close_frame
                            .as_ref()
                            .map(|f| f.code == CloseCode::Normal)
                            .unwrap_or(false);
                        if let Some(frame) = close_frame {
                            tracing::info!(
                                code = ?frame.code,
                                reason = %frame.reason,
                                "server closed connection"
                            );
                        } else {
                            tracing::warn!("server closed connection without close frame");
                        }

                        if clean || client.was_manual_disconnect().await {
                            client.finish_clean_close().await;
                        } else {
                            client.schedule_reconnect().await;
                        }
                        return;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(other) => {
                        tracing::warn!("ignoring unexpected non-text message: {:?}", other);
                    }
                    Err(e) => {
                        tracing::error!("websocket read error: {}", e);
                        if client.was_manual_disconnect().await {
                            client.finish_clean_close().await;
                        } else {
                            client.schedule_reconnect().await;
                        }
                        return;
                    }
                }
            }

            // Stream ended without a close frame. Treat as unclean unless the
            // teardown was requested locally.
            tracing::debug!("read task stream ended");
            if client.was_manual_disconnect().await {
                return;
            }
            if client.connection.state().await == ConnectionState::Connected {
                client.schedule_reconnect().await;
            }
        }
    }

    /// Outbound liveness ping, every configured interval while Connected.
    /// Missed inbound heartbeats are not tracked; a dead connection is only
    /// noticed through the transport's own close or error.
    fn heartbeat_loop(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let connection = Arc::downgrade(&self.connection);
        let interval = std::time::Duration::from_millis(self.options.heartbeat_interval_ms);
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // first tick fires immediately, skip it

            loop {
                ticker.tick().await;
                let Some(connection) = connection.upgrade() else {
                    break;
                };
                if !connection.is_connected().await {
                    break;
                }
                if connection.send_frame(&Frame::heartbeat()).await {
                    tracing::debug!("sent heartbeat");
                } else {
                    tracing::warn!("failed to send heartbeat");
                }
            }
            tracing::debug!("heartbeat task finished");
        }
    }

    /// Clean close: stop pushing, forget the handlers, settle Disconnected.
    /// The heartbeat task notices the state change and winds down itself.
    async fn finish_clean_close(&self) {
        self.router.clear().await;
        self.connection.clear_writer().await;
        self.set_state(ConnectionState::Disconnected).await;
    }

    /// Unclean close: hand reconnection off to its own task so the reader
    /// can finish. Living in a slot also lets `disconnect()` abort a
    /// pending retry outright.
    async fn schedule_reconnect(&self) {
        self.connection.clear_writer().await;
        let client = self.clone();
        let mut state = self.state.write().await;
        state
            .reconnect
            .spawn(async move { client.reconnect_loop().await });
    }

    /// Backoff schedule after an unclean close: keep attempting until
    /// connected, manually disconnected, or attempts are exhausted. The
    /// published state stays Reconnecting/Connecting between attempts, so
    /// watchers only ever see Disconnected once retrying is over.
    async fn reconnect_loop(&self) {
        loop {
            if self.was_manual_disconnect().await {
                tracing::info!("manual disconnect detected, not reconnecting");
                return;
            }

            let delay = {
                let mut state = self.state.write().await;
                state.backoff.next_delay()
            };
            let Some(delay) = delay else {
                tracing::warn!("reconnect attempts exhausted, realtime updates unavailable");
                self.set_state(ConnectionState::Disconnected).await;
                return;
            };

            self.set_state(ConnectionState::Reconnecting).await;
            tracing::info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            tokio::time::sleep(delay).await;

            if self.was_manual_disconnect().await {
                return;
            }
            // A user-initiated connect may have raced us during the delay.
            {
                let state = self.connection.state().await;
                if state == ConnectionState::Connected || state == ConnectionState::Connecting {
                    return;
                }
            }

            self.set_state(ConnectionState::Connecting).await;
            match self.establish().await {
                Ok(()) => {
                    tracing::info!("reconnected to event stream");
                    return;
                }
                Err(e) => {
                    tracing::error!("reconnect attempt failed: {}", e);
                }
            }
        }
    }

    async fn was_manual_disconnect(&self) -> bool {
        self.state.read().await.was_manual_disconnect
    }
}
