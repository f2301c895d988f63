mod envelope;

pub use envelope::{ApiEnvelope, PaginatedData};

use serde::de::DeserializeOwned;

use crate::sync::{Agent, Task};
use crate::types::{ConsoleError, Result};

/// Thin client for the console REST boundary.
///
/// Covers the handful of endpoints the realtime subsystem needs: snapshot
/// list fetches and the task actions that back optimistic merges. Retry and
/// token refresh live outside this crate; a failed call surfaces as an error
/// for the caller to handle.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// Fetch one page of agents for a snapshot load.
    pub async fn list_agents(&self, page: u32, page_size: u32) -> Result<PaginatedData<Agent>> {
        self.get_paginated("/api/agents", page, page_size).await
    }

    /// Fetch one page of tasks for a snapshot load.
    pub async fn list_tasks(&self, page: u32, page_size: u32) -> Result<PaginatedData<Task>> {
        self.get_paginated("/api/tasks", page, page_size).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        self.post_action(&format!("/api/tasks/{}/cancel", task_id), None)
            .await
    }

    pub async fn assign_task(&self, task_id: &str, agent_id: &str) -> Result<Task> {
        self.post_action(
            &format!("/api/tasks/{}/assign", task_id),
            Some(serde_json::json!({ "agentId": agent_id })),
        )
        .await
    }

    pub async fn retry_task(&self, task_id: &str) -> Result<Task> {
        self.post_action(&format!("/api/tasks/{}/retry", task_id), None)
            .await
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedData<T>> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("page", page), ("pageSize", page_size)]);
        request = self.authorize(request);

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ConsoleError::Api(format!(
                "GET {} failed with status {}",
                path,
                response.status()
            )));
        }

        let envelope: ApiEnvelope<PaginatedData<T>> = response.json().await?;
        envelope.into_data()
    }

    async fn post_action(&self, path: &str, body: Option<serde_json::Value>) -> Result<Task> {
        let mut request = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        request = self.authorize(request);

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ConsoleError::Api(format!(
                "POST {} failed with status {}",
                path,
                response.status()
            )));
        }

        let envelope: ApiEnvelope<Task> = response.json().await?;
        envelope.into_data()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}
