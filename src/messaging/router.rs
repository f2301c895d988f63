use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use super::{Frame, FrameType};
use crate::client::ConnectionManager;

/// Callback invoked for every frame of a registered type.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync + 'static>;

/// Parses inbound text into frames and dispatches them to per-type handlers.
///
/// The subscription table holds exactly one handler per frame type:
/// registering a second handler for the same type displaces the first. This
/// single-slot contract is deliberate, so callers can toggle a subscription
/// by re-registering without leaking stale handlers.
///
/// Heartbeat frames are intercepted at the protocol level and answered with a
/// heartbeat of our own; an application handler registered for `heartbeat`
/// still runs afterwards. Frames with no handler are dropped silently.
pub struct MessageRouter {
    handlers: RwLock<HashMap<FrameType, FrameHandler>>,
    connection: Weak<ConnectionManager>,
}

impl MessageRouter {
    pub fn new(connection: Weak<ConnectionManager>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            connection,
        }
    }

    /// Register the handler for a frame type, replacing any prior one.
    pub async fn on_frame<F>(&self, frame_type: FrameType, handler: F)
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().await;
        if handlers
            .insert(frame_type.clone(), Arc::new(handler))
            .is_some()
        {
            tracing::debug!(%frame_type, "replaced existing frame handler");
        }
    }

    /// Remove the handler for a frame type, if any.
    pub async fn off_frame(&self, frame_type: &FrameType) {
        self.handlers.write().await.remove(frame_type);
    }

    /// Drop every registered handler. Called on clean close.
    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Parse raw wire text and route the resulting frame. Malformed frames
    /// are logged and dropped without affecting connection state.
    pub async fn handle_raw(&self, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => self.route(frame).await,
            Err(e) => {
                tracing::error!("dropping malformed frame: {} - raw: {}", e, text);
            }
        }
    }

    /// Route a parsed frame: protocol-level handling first, then the
    /// application handler for that exact type.
    pub async fn route(&self, frame: Frame) {
        tracing::debug!(
            frame_type = %frame.frame_type,
            message_id = %frame.message_id,
            "routing frame"
        );

        if frame.frame_type == FrameType::Heartbeat {
            self.answer_heartbeat().await;
        }

        let handler = self.handlers.read().await.get(&frame.frame_type).cloned();
        match handler {
            Some(handler) => handler(frame),
            None => {
                tracing::debug!(
                    frame_type = %frame.frame_type,
                    "no handler registered, dropping frame"
                );
            }
        }
    }

    /// Reply to an inbound heartbeat with a heartbeat of our own.
    async fn answer_heartbeat(&self) {
        let Some(connection) = self.connection.upgrade() else {
            return;
        };
        if !connection.send_frame(&Frame::heartbeat()).await {
            tracing::debug!("could not answer heartbeat, connection not writable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn detached_router() -> MessageRouter {
        MessageRouter::new(Weak::new())
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let router = detached_router();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        router
            .on_frame(FrameType::StatusUpdate, move |frame| {
                seen_clone.lock().unwrap().push(frame.message_id);
            })
            .await;

        let frame = Frame::new(FrameType::StatusUpdate, serde_json::json!({}));
        let id = frame.message_id.clone();
        router.route(frame).await;

        assert_eq!(*seen.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn unregistered_type_is_dropped_without_panic() {
        let router = detached_router();
        router
            .route(Frame::new(
                FrameType::Custom("unknown_thing".into()),
                serde_json::json!({}),
            ))
            .await;
    }

    #[tokio::test]
    async fn malformed_text_is_dropped() {
        let router = detached_router();
        router.handle_raw("{not valid json").await;
        router.handle_raw(r#"{"type": 42}"#).await;
    }

    #[tokio::test]
    async fn second_registration_displaces_the_first() {
        let router = detached_router();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_clone = Arc::clone(&first);
        router
            .on_frame(FrameType::TaskResult, move |_| {
                first_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let second_clone = Arc::clone(&second);
        router
            .on_frame(FrameType::TaskResult, move |_| {
                second_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        router
            .route(Frame::new(FrameType::TaskResult, serde_json::json!({})))
            .await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn off_frame_removes_the_handler() {
        let router = detached_router();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        router
            .on_frame(FrameType::Error, move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        router.off_frame(&FrameType::Error).await;

        router
            .route(Frame::new(FrameType::Error, serde_json::json!({})))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn heartbeat_still_reaches_application_handler() {
        // Protocol interception and application dispatch are not mutually
        // exclusive for the heartbeat type.
        let router = detached_router();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        router
            .on_frame(FrameType::Heartbeat, move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        router.route(Frame::heartbeat()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_empties_the_table() {
        let router = detached_router();
        router.on_frame(FrameType::StatusUpdate, |_| {}).await;
        router.on_frame(FrameType::TaskResult, |_| {}).await;
        assert_eq!(router.handler_count().await, 2);

        router.clear().await;
        assert_eq!(router.handler_count().await, 0);
    }
}
