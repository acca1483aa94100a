//! Local key-value storage
//!
//! String keys mapped to string values, the same contract browser local
//! storage offers. Every write and removal is published as a
//! [`StorageEvent`] so other components can react to session changes made
//! outside their own call path.
//!
//! [`SqliteStore`] also sees writes made by other processes to the same
//! database file, for the keys it has been told to watch.

use crate::storage::error::{StorageError, StorageResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the change notification channel
const EVENT_CAPACITY: usize = 256;

/// A change to a single key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// New value, `None` when the key was removed
    pub new_value: Option<String>,
}

/// Synchronous key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently stored
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

fn publish(tx: &broadcast::Sender<StorageEvent>, key: &str, new_value: Option<&str>) {
    // No subscribers is fine
    let _ = tx.send(StorageEvent {
        key: key.to_string(),
        new_value: new_value.map(str::to_string),
    });
}

/// In-process store backed by a map
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(BTreeMap::new()),
            events,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        publish(&self.events, key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let removed = self
            .entries
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?
            .remove(key);
        if removed.is_some() {
            publish(&self.events, key, None);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

/// Watched keys as last seen by this handle
#[derive(Debug, Default)]
struct Watched {
    /// `PRAGMA data_version` at the last poll
    data_version: Option<i64>,
    values: BTreeMap<String, Option<String>>,
}

/// SQLite-backed persistent store
///
/// A single `kv` table; the connection sits behind a `std::sync::Mutex`
/// because `rusqlite::Connection` is not `Sync`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageEvent>,
    watched: Mutex<Watched>,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            events,
            watched: Mutex::new(Watched::default()),
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn watched(&self) -> StorageResult<std::sync::MutexGuard<'_, Watched>> {
        self.watched
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Publish changes to `keys` made through other connections
    ///
    /// Takes effect from the next [`poll_external`](Self::poll_external).
    pub fn watch_keys(&self, keys: &[&str]) -> StorageResult<()> {
        let conn = self.conn()?;
        let mut watched = self.watched()?;
        watched.data_version = Some(data_version(&conn)?);
        for key in keys {
            let value = read_value(&conn, key)?;
            watched.values.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Compare watched keys against the database if another connection
    /// committed since the last poll; returns the number of events published
    pub fn poll_external(&self) -> StorageResult<usize> {
        let changed = {
            let conn = self.conn()?;
            let mut watched = self.watched()?;
            if watched.values.is_empty() {
                return Ok(0);
            }

            let version = data_version(&conn)?;
            if watched.data_version == Some(version) {
                return Ok(0);
            }
            watched.data_version = Some(version);

            let mut changed = Vec::new();
            for (key, seen) in watched.values.iter_mut() {
                let current = read_value(&conn, key)?;
                if *seen != current {
                    *seen = current.clone();
                    changed.push((key.clone(), current));
                }
            }
            changed
        };

        for (key, value) in &changed {
            tracing::debug!(key = %key, "Key changed by another process");
            publish(&self.events, key, value.as_deref());
        }
        Ok(changed.len())
    }

    /// Poll for outside changes every `every` until the store is dropped
    pub fn spawn_external_poll(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(e) = store.poll_external() {
                    tracing::warn!(error = %e, "Polling for outside storage changes failed");
                }
            }
        })
    }

    /// Keep the watched copy in step with this handle's own writes
    fn note_own_write(&self, key: &str, value: Option<&str>) {
        if let Ok(mut watched) = self.watched.lock() {
            if let Some(seen) = watched.values.get_mut(key) {
                *seen = value.map(str::to_string);
            }
        }
    }
}

fn data_version(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

fn read_value(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        read_value(&*self.conn()?, key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        self.note_own_write(key, Some(value));
        publish(&self.events, key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM kv WHERE key = ?", params![key])?;
        if removed > 0 {
            self.note_own_write(key, None);
            publish(&self.events, key, None);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
