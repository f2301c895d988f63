mod agent;
mod store;
mod task;

pub use agent::{Agent, AgentStatus};
pub use store::{Entity, EntityStore, PendingUpdate};
pub use task::{Task, TaskStatus};

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::api::ApiClient;
use crate::client::ConsoleClient;
use crate::messaging::{Frame, FrameType, MessageRouter};
use crate::types::Result;

const SNAPSHOT_PAGE_SIZE: u32 = 100;

/// Wires the entity stores to a realtime client and the REST boundary.
///
/// Push frames are merged into the stores by handlers registered on the
/// client's router. Snapshot refreshes pull
/// through the REST boundary and replace a collection wholesale. User actions
/// (cancel, assign, retry) apply an optimistic merge first, await the REST
/// call, and revert the merge when the call fails.
pub struct EntitySync {
    agents: Arc<RwLock<EntityStore<Agent>>>,
    tasks: Arc<RwLock<EntityStore<Task>>>,
}

impl EntitySync {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(EntityStore::new())),
            tasks: Arc::new(RwLock::new(EntityStore::new())),
        }
    }

    /// The agent collection. Hold the lock only for the duration of a read.
    pub fn agents(&self) -> Arc<RwLock<EntityStore<Agent>>> {
        Arc::clone(&self.agents)
    }

    /// The task collection.
    pub fn tasks(&self) -> Arc<RwLock<EntityStore<Task>>> {
        Arc::clone(&self.tasks)
    }

    /// Register the push-delta handlers on a client's router.
    pub async fn attach(&self, client: &ConsoleClient) {
        self.register(client.router()).await;
    }

    /// Handler wiring, separated from [`attach`](Self::attach) so it can be
    /// exercised against a bare router.
    pub async fn register(&self, router: &MessageRouter) {
        let agents = Arc::clone(&self.agents);
        router
            .on_frame(FrameType::StatusUpdate, move |frame| {
                let Some((id, fields)) = delta_parts(&frame) else {
                    tracing::warn!("status_update frame without addressable payload, dropping");
                    return;
                };
                store_write(&agents).apply_delta(&id, fields);
            })
            .await;

        let tasks = Arc::clone(&self.tasks);
        router
            .on_frame(FrameType::TaskResult, move |frame| {
                let Some((id, fields)) = delta_parts(&frame) else {
                    tracing::warn!("task_result frame without addressable payload, dropping");
                    return;
                };
                store_write(&tasks).apply_delta(&id, fields);
            })
            .await;

        // Assignment frames may describe a task this console has never seen,
        // so they upsert instead of merge-only.
        let tasks = Arc::clone(&self.tasks);
        router
            .on_frame(FrameType::TaskAssignment, move |frame| {
                let Some((id, fields)) = delta_parts(&frame) else {
                    tracing::warn!("task_assignment frame without addressable payload, dropping");
                    return;
                };
                store_write(&tasks).upsert(&id, fields);
            })
            .await;
    }

    /// Replace the agent collection with a fresh REST snapshot.
    /// Returns the number of records loaded.
    pub async fn refresh_agents(&self, api: &ApiClient) -> Result<usize> {
        let records = fetch_all_pages(|page| api.list_agents(page, SNAPSHOT_PAGE_SIZE)).await?;
        let count = records.len();
        store_write(&self.agents).load_snapshot(records);
        tracing::info!(count, "loaded agent snapshot");
        Ok(count)
    }

    /// Replace the task collection with a fresh REST snapshot.
    pub async fn refresh_tasks(&self, api: &ApiClient) -> Result<usize> {
        let records = fetch_all_pages(|page| api.list_tasks(page, SNAPSHOT_PAGE_SIZE)).await?;
        let count = records.len();
        store_write(&self.tasks).load_snapshot(records);
        tracing::info!(count, "loaded task snapshot");
        Ok(count)
    }

    /// Cancel a task, keeping the UI responsive with an optimistic merge.
    pub async fn cancel_task(&self, api: &ApiClient, task_id: &str) -> Result<Task> {
        let optimistic = fields(serde_json::json!({ "status": "cancelled" }));
        self.run_task_action(task_id, optimistic, api.cancel_task(task_id))
            .await
    }

    /// Assign a task to an agent.
    pub async fn assign_task(&self, api: &ApiClient, task_id: &str, agent_id: &str) -> Result<Task> {
        let optimistic = fields(serde_json::json!({
            "status": "in_progress",
            "assignedAgentId": agent_id,
        }));
        self.run_task_action(task_id, optimistic, api.assign_task(task_id, agent_id))
            .await
    }

    /// Re-queue a failed task.
    pub async fn retry_task(&self, api: &ApiClient, task_id: &str) -> Result<Task> {
        let optimistic = fields(serde_json::json!({
            "status": "pending",
            "progress": 0,
            "errorMessage": null,
        }));
        self.run_task_action(task_id, optimistic, api.retry_task(task_id))
            .await
    }

    async fn run_task_action(
        &self,
        task_id: &str,
        optimistic: Map<String, Value>,
        call: impl std::future::Future<Output = Result<Task>>,
    ) -> Result<Task> {
        let pending = store_write(&self.tasks).apply_optimistic(task_id, &optimistic);

        match call.await {
            Ok(task) => Ok(task),
            Err(e) => {
                if let Some(pending) = pending {
                    tracing::warn!(task_id, "action failed, reverting optimistic merge");
                    store_write(&self.tasks).revert(pending);
                }
                Err(e)
            }
        }
    }
}

impl Default for EntitySync {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the record id and field map from a push frame's payload. The id
/// comes from the payload's `id`, falling back to the frame-level `agentId`.
fn delta_parts(frame: &Frame) -> Option<(String, &Map<String, Value>)> {
    let fields = frame.payload.as_object()?;
    let id = fields
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| frame.agent_id.clone())?;
    Some((id, fields))
}

/// A poisoned store lock means a handler panicked mid-merge; the collection
/// itself is still structurally sound, so keep serving rather than letting
/// the panic cascade into the reader task.
fn store_write<T: Entity>(lock: &RwLock<EntityStore<T>>) -> RwLockWriteGuard<'_, EntityStore<T>> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn fetch_all_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<crate::api::PaginatedData<T>>>,
{
    let mut records = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page).await?;
        records.extend(batch.items);
        if !batch.has_next {
            return Ok(records);
        }
        page += 1;
    }
}
