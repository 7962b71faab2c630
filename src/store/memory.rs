//! In-memory store implementations.
//!
//! Back the test suite and serve as zero-config defaults for local runs.
//! Object URLs are synthesized as `memory://{path}`.

use crate::types::Session;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{BlobObject, BlobRef, BlobStore, RecordStore, StoreHealth, StoreResult};

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: RwLock<BTreeMap<String, Session>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, session: &Session) -> StoreResult<Session> {
        let mut rows = self.rows.write().await;
        rows.insert(session.id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn fetch_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        let rows = self.rows.read().await;
        Ok(rows.get(id).cloned())
    }

    async fn fetch_all(&self) -> StoreResult<Vec<Session>> {
        let rows = self.rows.read().await;
        Ok(rows.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.remove(id);
        Ok(())
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth::ok()
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    object: BlobObject,
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> StoreResult<BlobRef> {
        let url = format!("memory://{path}");
        let mut objects = self.objects.write().await;
        objects.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                object: BlobObject {
                    path: path.to_string(),
                    url: url.clone(),
                    uploaded_at: Utc::now(),
                },
            },
        );
        Ok(BlobRef { url })
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let objects = self.objects.read().await;
        Ok(objects.get(path).map(|b| b.bytes.clone()))
    }

    async fn list_by_prefix(&self, prefix: &str, limit: usize) -> StoreResult<Vec<BlobObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .values()
            .filter(|b| b.object.path.starts_with(prefix))
            .take(limit)
            .map(|b| b.object.clone())
            .collect())
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        let mut objects = self.objects.write().await;
        Ok(objects.remove(path).is_some())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let mut objects = self.objects.write().await;
        let doomed: Vec<String> = objects
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect();
        for path in &doomed {
            objects.remove(path);
        }
        Ok(doomed.len())
    }
}
