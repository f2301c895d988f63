use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::types::constants::frame_types;

/// Frame type tag carried in the wire `type` field.
///
/// The five recognized application-level tags get their own variants;
/// anything else parses as `Custom` so unknown frames can be dropped by the
/// router instead of failing the whole read loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameType {
    TaskAssignment,
    TaskResult,
    StatusUpdate,
    Error,
    Heartbeat,
    Custom(String),
}

impl FrameType {
    pub fn parse(s: &str) -> Self {
        match s {
            frame_types::TASK_ASSIGNMENT => Self::TaskAssignment,
            frame_types::TASK_RESULT => Self::TaskResult,
            frame_types::STATUS_UPDATE => Self::StatusUpdate,
            frame_types::ERROR => Self::Error,
            frame_types::HEARTBEAT => Self::Heartbeat,
            _ => Self::Custom(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskAssignment => frame_types::TASK_ASSIGNMENT,
            Self::TaskResult => frame_types::TASK_RESULT,
            Self::StatusUpdate => frame_types::STATUS_UPDATE,
            Self::Error => frame_types::ERROR,
            Self::Heartbeat => frame_types::HEARTBEAT,
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for FrameType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Serialized as the bare tag string, not an externally tagged enum.
impl Serialize for FrameType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FrameType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// One discrete message unit exchanged over the stream connection.
///
/// Wire shape: `{"type", "payload", "timestamp", "messageId", "agentId"?,
/// "correlationId"?}` with an ISO-8601 timestamp. Frames are immutable once
/// received; the router never mutates them after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: serde_json::Value) -> Self {
        Self {
            frame_type,
            payload,
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            agent_id: None,
            correlation_id: None,
        }
    }

    /// Liveness ping sent from this side, and the reply to an inbound one.
    pub fn heartbeat() -> Self {
        Self::new(FrameType::Heartbeat, serde_json::json!({}))
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
