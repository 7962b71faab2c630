//! Turn append coordinator.
//!
//! Appends one conversation turn to a cached session, persists the updated
//! row, and rewrites the full session manifest. A cache miss that survives
//! hydration and the direct fetch is treated as a recoverable inconsistency:
//! a placeholder row is synthesized and adopted, because append requests can
//! race session-creation persistence across process restarts or
//! multi-instance deployments.

use crate::anomaly::{AnomalyKind, AnomalyRegistry};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::store::{BlobStore, RecordStore};
use crate::types::{NewTurn, Session, Turn};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::{write_manifest, SessionCache};

/// Coordinates turn appends against both durable stores.
pub struct TurnAppendCoordinator {
    cache: Arc<SessionCache>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    anomalies: Arc<AnomalyRegistry>,
    config: Arc<ArchiveConfig>,
}

impl TurnAppendCoordinator {
    pub fn new(
        cache: Arc<SessionCache>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        anomalies: Arc<AnomalyRegistry>,
        config: Arc<ArchiveConfig>,
    ) -> Self {
        Self {
            cache,
            records,
            blobs,
            anomalies,
            config,
        }
    }

    /// Append a turn to a session.
    ///
    /// The cache is committed only after both the record upsert and the
    /// manifest rewrite succeed, so a persistence failure never leaves the
    /// cache ahead of the durable stores. Appends for one session id are
    /// serialized so manifest rewrites are strictly ordered.
    pub async fn append(&self, session_id: &str, new_turn: NewTurn) -> Result<Turn> {
        let lock = self.cache.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = match self.cache.get(session_id).await? {
            Some(session) => session,
            None => self.resynthesize(session_id).await?,
        };

        let turn = Turn {
            id: Uuid::new_v4().to_string(),
            role: new_turn.role,
            text: new_turn.text,
            audio_blob_url: new_turn.audio_blob_url,
        };
        session.push_turn(turn.clone());

        self.records
            .upsert(&session)
            .await
            .map_err(|e| Error::record_store(session_id, e.to_string()))?;

        let manifest_url = write_manifest(self.blobs.as_ref(), &self.config, &session).await?;
        session.artifacts.manifest = Some(manifest_url);

        // Second upsert carries the manifest URL; only now is the cache
        // allowed to see the mutation.
        self.records
            .upsert(&session)
            .await
            .map_err(|e| Error::record_store(session_id, e.to_string()))?;
        self.cache.commit(session).await;

        Ok(turn)
    }

    /// Recover from a cache/store divergence by synthesizing a placeholder
    /// session row and adopting it.
    ///
    /// If the synthesis upsert itself fails the miss is terminal and
    /// surfaces as `SessionNotFound`.
    async fn resynthesize(&self, session_id: &str) -> Result<Session> {
        warn!(session_id = %session_id, "Append hit unknown session; synthesizing placeholder row");
        self.anomalies.flag(
            AnomalyKind::SessionResynthesized,
            session_id,
            "turn append raced session creation; placeholder row adopted",
        );

        let session = Session::new(
            session_id.to_string(),
            self.config.fallback_email.clone(),
            None,
        );
        self.records
            .upsert(&session)
            .await
            .map_err(|_| Error::SessionNotFound(session_id.to_string()))?;
        self.cache.commit(session.clone()).await;
        Ok(session)
    }
}
