//! Blob store trait: the hierarchical object backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreResult;

/// A stored object as returned by prefix listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobObject {
    pub path: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Result of a blob write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRef {
    pub url: String,
}

/// Hierarchical object store for manifests, transcripts, and primers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write an object, returning its public URL.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<BlobRef>;

    /// Fetch an object's bytes, or `None` if absent.
    async fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// List objects under a prefix, up to `limit`.
    async fn list_by_prefix(&self, prefix: &str, limit: usize) -> StoreResult<Vec<BlobObject>>;

    /// Delete one object. Returns whether an object existed at the path.
    async fn delete(&self, path: &str) -> StoreResult<bool>;

    /// Delete every object under a prefix. Returns the number removed.
    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<usize>;
}
