//! In-memory record lists with snapshot persistence
//!
//! ```text
//! load:  remote query (owner) ──fail──▶ local snapshot ──fail──▶ empty
//! write: build new list → local snapshot → commit in memory → remote upsert
//! ```
//!
//! A write that cannot reach local storage fails without touching the
//! in-memory list. Remote write failures are logged; the snapshot already
//! holds the change.

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::{Record, OWNER_FIELD};
use crate::storage::{Backends, Document, StorageError};
use serde_json::Value;
use std::sync::RwLock;

/// Where the last load got its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Local,
    /// Nothing could be loaded; the list was reset
    Empty,
}

impl std::fmt::Display for LoadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadSource::Remote => write!(f, "remote"),
            LoadSource::Local => write!(f, "local"),
            LoadSource::Empty => write!(f, "empty"),
        }
    }
}

#[derive(Debug)]
struct Loaded<R> {
    owner: Option<String>,
    items: Vec<R>,
}

/// The list of one record kind for the current owner
pub struct RecordSet<R: Record> {
    backends: Backends,
    state: RwLock<Loaded<R>>,
}

/// Local snapshot key for `owner`
pub fn snapshot_key<R: Record>(owner: &str) -> String {
    format!("{}_{}", R::KEY_PREFIX, owner)
}

fn to_document<R: Record>(record: &R) -> DomainResult<Document> {
    match serde_json::to_value(record).map_err(StorageError::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(DomainError::Invalid {
            kind: R::KIND,
            reason: "record did not serialize to an object".to_string(),
        }),
    }
}

/// Decode, normalize and validate; `None` for anything malformed
fn from_value<R: Record>(value: Value, owner: &str) -> Option<R> {
    let mut record: R = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(kind = R::KIND, error = %e, "Skipping malformed record");
            return None;
        }
    };
    record.normalize();
    if let Err(reason) = record.validate() {
        tracing::warn!(kind = R::KIND, id = record.id(), %reason, "Skipping invalid record");
        return None;
    }
    if !record.owner().is_empty() && record.owner() != owner {
        tracing::warn!(kind = R::KIND, id = record.id(), "Skipping record of another owner");
        return None;
    }
    Some(record)
}

impl<R: Record> RecordSet<R> {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            state: RwLock::new(Loaded {
                owner: None,
                items: Vec::new(),
            }),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Loaded<R>) -> T) -> T {
        match self.state.read() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write(&self, owner: Option<&str>, items: Vec<R>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.owner = owner.map(str::to_string);
        state.items = items;
    }

    /// Owner of the loaded list
    pub fn owner(&self) -> Option<String> {
        self.read(|s| s.owner.clone())
    }

    pub fn items(&self) -> Vec<R> {
        self.read(|s| s.items.clone())
    }

    pub fn with_items<T>(&self, f: impl FnOnce(&[R]) -> T) -> T {
        self.read(|s| f(&s.items))
    }

    pub fn len(&self) -> usize {
        self.read(|s| s.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.read(|s| s.items.iter().find(|r| r.id() == id).cloned())
    }

    /// Drop everything held in memory
    pub fn clear(&self) {
        self.write(None, Vec::new());
    }

    /// Load the list for `owner`
    ///
    /// Any failure leaves an empty, unowned list behind so the next call
    /// tries again instead of writing over data it could not read.
    pub async fn load(&self, owner: &str) -> DomainResult<LoadSource> {
        if let Some(remote) = &self.backends.remote {
            match remote.query(R::COLLECTION, OWNER_FIELD, owner).await {
                Ok(documents) => {
                    let items: Vec<R> = documents
                        .into_iter()
                        .filter_map(|doc| from_value(Value::Object(doc), owner))
                        .collect();
                    // Keep the snapshot warm for offline use
                    if let Err(e) = self.save_snapshot(owner, &items) {
                        tracing::warn!(kind = R::KIND, error = %e, "Failed to refresh local snapshot");
                    }
                    tracing::debug!(kind = R::KIND, count = items.len(), "Loaded from remote");
                    self.write(Some(owner), items);
                    return Ok(LoadSource::Remote);
                }
                Err(e) => {
                    tracing::warn!(kind = R::KIND, error = %e, "Remote load failed, using local snapshot");
                }
            }
        }

        match self.load_snapshot(owner) {
            Ok(Some(items)) => {
                tracing::debug!(kind = R::KIND, count = items.len(), "Loaded from local snapshot");
                self.write(Some(owner), items);
                Ok(LoadSource::Local)
            }
            Ok(None) => {
                self.write(Some(owner), Vec::new());
                Ok(LoadSource::Local)
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Make sure the held list is `owner`'s, loading it if not
    pub async fn ensure_owner(&self, owner: &str) -> DomainResult<()> {
        if self.owner().as_deref() != Some(owner) {
            self.load(owner).await?;
        }
        Ok(())
    }

    fn load_snapshot(&self, owner: &str) -> DomainResult<Option<Vec<R>>> {
        let Some(raw) = self.backends.local.get(&snapshot_key::<R>(owner))? else {
            return Ok(None);
        };
        let values: Vec<Value> = serde_json::from_str(&raw).map_err(StorageError::from)?;
        Ok(Some(
            values
                .into_iter()
                .filter_map(|value| from_value(value, owner))
                .collect(),
        ))
    }

    fn save_snapshot(&self, owner: &str, items: &[R]) -> DomainResult<()> {
        let raw = serde_json::to_string(items).map_err(StorageError::from)?;
        self.backends.local.set(&snapshot_key::<R>(owner), &raw)?;
        Ok(())
    }

    /// Persist the whole list for `owner` and make it current
    fn commit(&self, owner: &str, items: Vec<R>) -> DomainResult<()> {
        self.save_snapshot(owner, &items)?;
        self.write(Some(owner), items);
        Ok(())
    }

    async fn push_remote(&self, record: &R) {
        let Some(remote) = &self.backends.remote else {
            return;
        };
        let result = match to_document(record) {
            Ok(document) => remote
                .put(R::COLLECTION, record.id(), document)
                .await
                .map_err(DomainError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(kind = R::KIND, id = record.id(), error = %e, "Remote write failed");
        }
    }

    /// Append a record owned by `owner`
    pub async fn insert(&self, owner: &str, mut record: R) -> DomainResult<R> {
        record.set_owner(owner);
        record
            .validate()
            .map_err(|reason| DomainError::Invalid {
                kind: R::KIND,
                reason,
            })?;

        let mut items = self.items();
        if items.iter().any(|r| r.id() == record.id()) {
            return Err(DomainError::Invalid {
                kind: R::KIND,
                reason: format!("duplicate id {}", record.id()),
            });
        }
        items.push(record.clone());
        self.commit(owner, items)?;
        self.push_remote(&record).await;
        Ok(record)
    }

    /// Replace the record with the same id
    pub async fn replace(&self, owner: &str, mut record: R) -> DomainResult<R> {
        record.set_owner(owner);
        record
            .validate()
            .map_err(|reason| DomainError::Invalid {
                kind: R::KIND,
                reason,
            })?;

        let mut items = self.items();
        let slot = items
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| DomainError::NotFound {
                kind: R::KIND,
                id: record.id().to_string(),
            })?;
        *slot = record.clone();
        self.commit(owner, items)?;
        self.push_remote(&record).await;
        Ok(record)
    }

    /// Remove by id, returning the removed record
    pub async fn remove(&self, owner: &str, id: &str) -> DomainResult<R> {
        let mut items = self.items();
        let position = items
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| DomainError::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            })?;
        let removed = items.remove(position);
        self.commit(owner, items)?;

        if let Some(remote) = &self.backends.remote {
            if let Err(e) = remote.delete(R::COLLECTION, id).await {
                tracing::warn!(kind = R::KIND, id, error = %e, "Remote delete failed");
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Department, HourEntry};
    use crate::storage::{DocumentStore, KeyValueStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_writes_snapshot_and_remote() {
        let (backends, remote) = Backends::in_memory();
        let set: RecordSet<Department> = RecordSet::new(backends.clone());

        let dept = set.insert("u1", Department::new("Ventas")).await.unwrap();

        assert_eq!(dept.user_id, "u1");
        assert_eq!(set.len(), 1);
        assert_eq!(remote.len("departments"), 1);
        let raw = backends.local.get("departments_u1").unwrap().unwrap();
        assert!(raw.contains("Ventas"));
    }

    #[tokio::test]
    async fn test_load_prefers_remote() {
        let (backends, remote) = Backends::in_memory();
        let writer: RecordSet<Department> = RecordSet::new(backends.clone());
        writer.insert("u1", Department::new("Ventas")).await.unwrap();
        // Snapshot now disagrees with the remote
        backends.local.set("departments_u1", "[]").unwrap();

        let reader: RecordSet<Department> = RecordSet::new(backends);
        assert_eq!(reader.load("u1").await.unwrap(), LoadSource::Remote);
        assert_eq!(reader.len(), 1);
        assert_eq!(remote.len("departments"), 1);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_snapshot_when_remote_down() {
        let (backends, remote) = Backends::in_memory();
        let writer: RecordSet<Department> = RecordSet::new(backends.clone());
        writer.insert("u1", Department::new("Ventas")).await.unwrap();
        remote.set_available(false);

        let reader: RecordSet<Department> = RecordSet::new(backends);
        assert_eq!(reader.load("u1").await.unwrap(), LoadSource::Local);
        assert_eq!(reader.items()[0].name, "Ventas");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_resets_to_empty() {
        let local = Arc::new(MemoryStore::new());
        local.set("departments_u1", "{not json").unwrap();
        let set: RecordSet<Department> = RecordSet::new(Backends::offline(local.clone()));

        assert!(set.load("u1").await.is_err());
        assert!(set.is_empty());
        assert_eq!(set.owner(), None);

        // Still unreadable on the next attempt, and left untouched
        assert!(set.ensure_owner("u1").await.is_err());
        assert_eq!(local.get("departments_u1").unwrap().unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_invalid_documents_are_skipped() {
        let (backends, remote) = Backends::in_memory();
        for (id, doc) in [
            ("d1", json!({"id": "d1", "userId": "u1", "name": "Ventas"})),
            ("d2", json!({"id": "d2", "userId": "u1", "name": "  "})),
            ("d3", json!({"id": "d3", "userId": "u1"})),
        ] {
            let Value::Object(map) = doc else { unreachable!() };
            remote.put("departments", id, map).await.unwrap();
        }

        let set: RecordSet<Department> = RecordSet::new(backends);
        set.load("u1").await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_hours_are_recomputed_on_load() {
        let local = Arc::new(MemoryStore::new());
        local
            .set(
                "hours_u1",
                r#"[{"id": "h1", "userId": "u1", "employeeId": "e1", "date": "2024-03-01",
                     "entryTime": "22:00", "exitTime": "02:00"},
                    {"id": "h2", "userId": "u1", "employeeId": "e1", "date": "2024-03-02",
                     "entryTime": "08:00", "exitTime": "12:00", "hours": 99.0}]"#,
            )
            .unwrap();
        let set: RecordSet<HourEntry> = RecordSet::new(Backends::offline(local));

        set.load("u1").await.unwrap();
        let mut hours: Vec<f64> = set.items().iter().map(|e| e.hours).collect();
        hours.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(hours, vec![4.0, 4.0]);
    }

    #[tokio::test]
    async fn test_snapshots_are_scoped_per_owner() {
        let local = Arc::new(MemoryStore::new());
        let set: RecordSet<Department> = RecordSet::new(Backends::offline(local.clone()));
        set.insert("u1", Department::new("Ventas")).await.unwrap();

        set.load("u2").await.unwrap();
        assert!(set.is_empty());
        assert!(local.get("departments_u2").unwrap().is_none());

        set.load("u1").await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let set: RecordSet<Department> = RecordSet::new(Backends::offline(Arc::new(MemoryStore::new())));
        let err = set.remove("u1", "nope").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
