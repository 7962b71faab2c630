//! SessionArchive: the service facade exposed to route handlers.
//!
//! Constructed once at process start with injected store dependencies and
//! passed by handle to request handlers; all state lives on this instance
//! rather than in globals.

use crate::anomaly::{Anomaly, AnomalyRegistry};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::primer::PrimerService;
use crate::session::{FinalizeCoordinator, SessionCache, TurnAppendCoordinator};
use crate::store::{BlobStore, EmailNotifier, RecordStore, StoreHealth};
use crate::types::{
    handle_bucket, normalize_handle, FinalizeRequest, FinalizeResult, NewTurn, Primer, Session,
    Turn,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Session memory cache and durable-persistence coordinator.
pub struct SessionArchive {
    cache: Arc<SessionCache>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    append: TurnAppendCoordinator,
    finalize: FinalizeCoordinator,
    primers: PrimerService,
    anomalies: Arc<AnomalyRegistry>,
    config: Arc<ArchiveConfig>,
}

impl SessionArchive {
    /// Wire the archive from its injected collaborators.
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        email: Arc<dyn EmailNotifier>,
        config: ArchiveConfig,
    ) -> Self {
        let config = Arc::new(config);
        let anomalies = Arc::new(AnomalyRegistry::new(config.anomaly_capacity));
        let cache = Arc::new(SessionCache::new(Arc::clone(&records)));
        let append = TurnAppendCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&records),
            Arc::clone(&blobs),
            Arc::clone(&anomalies),
            Arc::clone(&config),
        );
        let finalize = FinalizeCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&records),
            Arc::clone(&blobs),
            email,
            Arc::clone(&anomalies),
            Arc::clone(&config),
        );
        let primers = PrimerService::new(
            Arc::clone(&cache),
            Arc::clone(&blobs),
            Arc::clone(&config),
        );
        Self {
            cache,
            records,
            blobs,
            append,
            finalize,
            primers,
            anomalies,
            config,
        }
    }

    /// Create a new in-progress session.
    pub async fn create_session(
        &self,
        email_to: &str,
        user_handle: Option<&str>,
    ) -> Result<Session> {
        let session = Session::new(
            Uuid::new_v4().to_string(),
            email_to.trim().to_string(),
            normalize_handle(user_handle),
        );
        self.records
            .upsert(&session)
            .await
            .map_err(|e| Error::record_store(&session.id, e.to_string()))?;
        self.cache.commit(session.clone()).await;
        info!(session_id = %session.id, handle = ?session.user_handle, "Session created");
        Ok(session)
    }

    /// Append a turn to a session (see [`TurnAppendCoordinator`]).
    pub async fn append_turn(&self, session_id: &str, turn: NewTurn) -> Result<Turn> {
        self.append.append(session_id, turn).await
    }

    /// Finalize a session and rebuild its handle's primer.
    ///
    /// Primer rebuild failure is logged and does not affect the finalize
    /// result.
    pub async fn finalize_session(
        &self,
        session_id: &str,
        request: FinalizeRequest,
    ) -> Result<FinalizeResult> {
        let result = self.finalize.finalize(session_id, request).await?;
        if let Some(session) = &result.session {
            let handle = session.user_handle.clone();
            if let Err(e) = self.primers.rebuild(handle.as_deref()).await {
                warn!(session_id = %session_id, error = %e,
                    "Primer rebuild after finalize failed");
            }
        }
        Ok(result)
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.cache.get(id).await
    }

    /// List sessions, optionally restricted to one normalized handle.
    ///
    /// With a handle filter only sessions created under that exact handle
    /// are returned: never another handle's sessions, never unassigned ones.
    pub async fn list_sessions(&self, handle: Option<&str>) -> Result<Vec<Session>> {
        let mut sessions = self.cache.snapshot().await?;
        if let Some(wanted) = normalize_handle(handle) {
            sessions.retain(|s| s.user_handle.as_deref() == Some(wanted.as_str()));
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    /// Delete a session: cache entry, durable row, and every blob under the
    /// session's prefix. The handle's primer is rebuilt, or removed entirely
    /// when no sessions remain for that handle.
    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        let session = self.cache.get(id).await?;
        let Some(session) = session else {
            return Ok(false);
        };

        self.records
            .delete(id)
            .await
            .map_err(|e| Error::record_store(id, e.to_string()))?;
        self.cache.remove(id).await;

        let prefix = self.config.session_dir(id);
        let removed = self
            .blobs
            .delete_by_prefix(&prefix)
            .await
            .map_err(|e| Error::blob_store(&prefix, e.to_string()))?;
        info!(session_id = %id, blobs_removed = removed, "Session deleted");

        let handle = session.user_handle.clone();
        let remaining = self.list_sessions(handle.as_deref()).await?;
        let has_remaining = if handle.is_some() {
            !remaining.is_empty()
        } else {
            remaining.iter().any(|s| s.user_handle.is_none())
        };
        if has_remaining {
            if let Err(e) = self.primers.rebuild(handle.as_deref()).await {
                warn!(session_id = %id, error = %e, "Primer rebuild after delete failed");
            }
        } else if let Err(e) = self.primers.remove(handle.as_deref()).await {
            warn!(session_id = %id, error = %e, "Primer removal after delete failed");
        }

        Ok(true)
    }

    /// Delete every session, its durable rows, and its blobs.
    ///
    /// Primers stay in sync with deletion: with no sessions left, every
    /// affected handle's primer is removed along with its cached state.
    pub async fn clear_all_sessions(&self) -> Result<()> {
        let sessions = self.cache.snapshot().await?;
        let buckets: BTreeSet<String> = sessions
            .iter()
            .map(|s| handle_bucket(s.user_handle.as_deref()))
            .collect();
        for session in &sessions {
            self.records
                .delete(&session.id)
                .await
                .map_err(|e| Error::record_store(&session.id, e.to_string()))?;
            let prefix = self.config.session_dir(&session.id);
            self.blobs
                .delete_by_prefix(&prefix)
                .await
                .map_err(|e| Error::blob_store(&prefix, e.to_string()))?;
        }
        self.cache.clear().await;

        for bucket in &buckets {
            if let Err(e) = self.primers.remove(Some(bucket.as_str())).await {
                warn!(bucket = %bucket, error = %e, "Primer removal after clear failed");
            }
        }
        info!(
            sessions = sessions.len(),
            primers = buckets.len(),
            "All sessions cleared"
        );
        Ok(())
    }

    /// Fetch (or lazily build) the primer document for a handle.
    pub async fn memory_primer(&self, handle: Option<&str>) -> Result<Primer> {
        self.primers.get(handle).await
    }

    /// Rebuild a handle's primer from scratch and persist it.
    pub async fn rebuild_primer(&self, handle: Option<&str>) -> Result<Primer> {
        self.primers.rebuild(handle).await
    }

    /// Snapshot of flagged anomalies, oldest first.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.all()
    }

    /// Record-store health passthrough.
    pub async fn health(&self) -> StoreHealth {
        self.records.health().await
    }
}
