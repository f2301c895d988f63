use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::Entity;

/// Operational status of a fleet agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Offline,
    Starting,
    Online,
    Busy,
    Maintenance,
    Error,
}

/// One autonomous agent as the console sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Share of the agent's task capacity currently in use, 0.0..=1.0.
    #[serde(default)]
    pub current_load: f64,
    #[serde(default = "Utc::now")]
    pub last_activity: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Agent {
    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_status_uses_snake_case_tags() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Maintenance).unwrap(),
            r#""maintenance""#
        );
        assert_eq!(
            serde_json::from_str::<AgentStatus>(r#""busy""#).unwrap(),
            AgentStatus::Busy
        );
    }

    #[test]
    fn agent_deserializes_from_sparse_payload() {
        let agent: Agent =
            serde_json::from_str(r#"{"id": "a1", "status": "online"}"#).unwrap();
        assert_eq!(agent.id, "a1");
        assert_eq!(agent.status, AgentStatus::Online);
        assert!(agent.capabilities.is_empty());
    }
}
