//! Remote document store
//!
//! Collections of flat JSON documents, each tagged with an ownership field.
//! Consumed through [`DocumentStore`]; the HTTP client speaks a small REST
//! dialect:
//!
//! ```text
//! GET    {base}/v1/collections/{collection}/documents?{owner_field}={owner}
//! PUT    {base}/v1/collections/{collection}/documents/{id}
//! DELETE {base}/v1/collections/{collection}/documents/{id}
//! ```

use crate::storage::error::{StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// A flat key-value document
pub type Document = Map<String, Value>;

/// Document store consumed by the domain managers
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection` whose `owner_field` equals `owner`
    async fn query(
        &self,
        collection: &str,
        owner_field: &str,
        owner: &str,
    ) -> StorageResult<Vec<Document>>;

    /// Create or replace a document
    async fn put(&self, collection: &str, id: &str, document: Document) -> StorageResult<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;
}

/// Connection settings for [`HttpDocumentStore`]
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. "http://localhost:8090"
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

/// REST client for the remote document store
pub struct HttpDocumentStore {
    client: Client,
    config: RemoteConfig,
}

impl HttpDocumentStore {
    pub fn new(config: RemoteConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/collections/{}/documents",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(collection)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }
}

/// Turn a non-success response into a [`StorageError`]
async fn check(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(StorageError::Unavailable(format!("{}: {}", status, message)))
    } else {
        Err(StorageError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn query(
        &self,
        collection: &str,
        owner_field: &str,
        owner: &str,
    ) -> StorageResult<Vec<Document>> {
        let url = format!(
            "{}?{}={}",
            self.collection_url(collection),
            urlencoding::encode(owner_field),
            urlencoding::encode(owner)
        );

        let response = check(self.client.get(&url).send().await?).await?;
        let documents: Vec<Document> = response.json().await?;
        Ok(documents)
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> StorageResult<()> {
        let url = self.document_url(collection, id);
        check(self.client.put(&url).json(&document).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        let url = self.document_url(collection, id);
        let response = self.client.delete(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }
}

/// In-process document store
///
/// `set_available(false)` makes every call fail with
/// [`StorageError::Unavailable`], which is how an unreachable remote looks to
/// the managers.
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    available: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of documents in a collection, regardless of owner
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("document store offline".to_string()))
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(
        &self,
        collection: &str,
        owner_field: &str,
        owner: &str,
    ) -> StorageResult<Vec<Document>> {
        self.ensure_available()?;
        let collections = self
            .collections
            .read()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| doc.get(owner_field).and_then(Value::as_str) == Some(owner))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, id: &str, document: Document) -> StorageResult<()> {
        self.ensure_available()?;
        self.collections
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        self.ensure_available()?;
        if let Some(docs) = self
            .collections
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?
            .get_mut(collection)
        {
            docs.remove(id);
        }
        Ok(())
    }
}
