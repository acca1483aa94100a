//! Storage backends
//!
//! - **local**: synchronous key-value storage (in-memory or SQLite) with
//!   change notifications
//! - **remote**: asynchronous document store (HTTP or in-memory)
//! - **error**: error types
//!
//! # Layout
//!
//! ```text
//! Local keys:
//!   nomina.session, currentUser, user      session cache
//!   employees_<uid>, hours_<uid>, ...      whole-list JSON snapshots
//!
//! Remote collections:
//!   employees, hours, payroll, departments documents owned via "userId"
//! ```

pub mod error;
pub mod local;
pub mod remote;

pub use error::{StorageError, StorageResult};
pub use local::{KeyValueStore, MemoryStore, SqliteStore, StorageEvent};
pub use remote::{
    Document, DocumentStore, HttpDocumentStore, MemoryDocumentStore, RemoteConfig,
};

use std::sync::Arc;

/// The storage backends a manager reads and writes through
#[derive(Clone)]
pub struct Backends {
    /// Local storage, always present
    pub local: Arc<dyn KeyValueStore>,
    /// Remote document store, `None` when running offline
    pub remote: Option<Arc<dyn DocumentStore>>,
}

impl Backends {
    pub fn new(local: Arc<dyn KeyValueStore>, remote: Option<Arc<dyn DocumentStore>>) -> Self {
        Self { local, remote }
    }

    /// Local storage only
    pub fn offline(local: Arc<dyn KeyValueStore>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// Fresh in-memory backends with an in-memory remote store
    pub fn in_memory() -> (Self, Arc<MemoryDocumentStore>) {
        let remote = Arc::new(MemoryDocumentStore::new());
        let backends = Self {
            local: Arc::new(MemoryStore::new()),
            remote: Some(remote.clone() as Arc<dyn DocumentStore>),
        };
        (backends, remote)
    }
}
