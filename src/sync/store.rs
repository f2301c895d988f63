use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A record kind the store can reconcile: stable id plus a merge timestamp.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
    fn touch(&mut self, now: DateTime<Utc>);
}

/// Revert token for an optimistic merge: the prior values of exactly the
/// fields the merge touched. Handing it to [`EntityStore::revert`] restores
/// them through the normal merge path.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    id: String,
    prior: Map<String, Value>,
}

impl PendingUpdate {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// The authoritative in-memory collection for one entity kind.
///
/// Three update sources feed it: REST snapshot loads, push-delivered deltas,
/// and optimistic local mutations. All of them resolve by last-write-wins in
/// call order; there is no timestamp comparison and no conflict detection.
/// A stale interleaving converges on the next snapshot load.
///
/// Not internally synchronized. A multi-threaded owner wraps the store in one
/// exclusive-writer lock per collection.
pub struct EntityStore<T: Entity> {
    records: Vec<T>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            last_refreshed: None,
        }
    }

    /// Replace the whole collection with a REST-fetched snapshot and stamp
    /// the collection-level refresh instant.
    pub fn load_snapshot(&mut self, records: Vec<T>) {
        self.records = records;
        self.last_refreshed = Some(Utc::now());
    }

    /// Merge a push-delivered delta into the record with the given id.
    /// Fields overwrite at the top level (no deep merge of nested values) and
    /// `updated_at` advances. Unknown ids are a no-op; returns whether a
    /// record was changed.
    pub fn apply_delta(&mut self, id: &str, fields: &Map<String, Value>) -> bool {
        self.merge_into(id, fields)
    }

    /// Merge-if-present, insert-if-absent. An absent id only inserts when the
    /// delta carries a full record (assignment-shaped, e.g. a freshly created
    /// task); the new record goes to the head of the collection. A mere field
    /// delta for an unknown id is dropped.
    pub fn upsert(&mut self, id: &str, fields: &Map<String, Value>) -> bool {
        if self.records.iter().any(|r| r.id() == id) {
            return self.merge_into(id, fields);
        }

        match serde_json::from_value::<T>(Value::Object(fields.clone())) {
            Ok(mut record) => {
                record.touch(Utc::now());
                self.records.insert(0, record);
                true
            }
            Err(e) => {
                tracing::debug!("delta for unknown id {} is not a full record, dropping: {}", id, e);
                false
            }
        }
    }

    /// Merge a locally-issued mutation before server confirmation arrives.
    /// Same mechanics as [`apply_delta`](Self::apply_delta), but returns a
    /// [`PendingUpdate`] capturing the prior values of the touched fields so
    /// the caller can revert if the backing call fails.
    pub fn apply_optimistic(
        &mut self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Option<PendingUpdate> {
        let record = self.records.iter().find(|r| r.id() == id)?;
        let current = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            _ => return None,
        };

        let prior: Map<String, Value> = fields
            .keys()
            .filter_map(|key| current.get(key).map(|v| (key.clone(), v.clone())))
            .collect();

        if self.merge_into(id, fields) {
            Some(PendingUpdate {
                id: id.to_string(),
                prior,
            })
        } else {
            None
        }
    }

    /// Restore the fields an optimistic merge touched. This is itself a
    /// last-write-wins merge: a push delta applied in between will be
    /// clobbered and corrected by the next snapshot.
    pub fn revert(&mut self, pending: PendingUpdate) -> bool {
        self.apply_delta(&pending.id, &pending.prior)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Read-only view of the collection, in insertion order.
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Shared merge path: serialize the record, overwrite the delta's keys at
    /// the top level, deserialize back, stamp `updated_at`.
    fn merge_into(&mut self, id: &str, fields: &Map<String, Value>) -> bool {
        let Some(index) = self.records.iter().position(|r| r.id() == id) else {
            return false;
        };

        let mut value = match serde_json::to_value(&self.records[index]) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("could not serialize record {} for merge: {}", id, e);
                return false;
            }
        };

        let Value::Object(ref mut map) = value else {
            return false;
        };
        for (key, field) in fields {
            map.insert(key.clone(), field.clone());
        }

        match serde_json::from_value::<T>(value) {
            Ok(mut merged) => {
                merged.touch(Utc::now());
                self.records[index] = merged;
                true
            }
            Err(e) => {
                tracing::warn!("dropping unmergeable delta for record {}: {}", id, e);
                false
            }
        }
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
