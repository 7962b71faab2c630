//! Process-wide session cache backed by the record store.
//!
//! Hydrates once per process lifetime: the first resolver to miss loads
//! every row from the record store, and concurrent callers join that one
//! in-flight load instead of issuing redundant full-table reads. After
//! hydration the cache is the source of truth; every mutation is echoed to
//! the record store before the cache entry is committed.

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::types::Session;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Process-lifetime mapping from session id to session record.
pub struct SessionCache {
    records: Arc<dyn RecordStore>,
    sessions: RwLock<HashMap<String, Session>>,
    /// Permanent for the process lifetime once set.
    hydrated: AtomicBool,
    /// Serializes hydration so concurrent callers share one load.
    hydration: Mutex<()>,
    /// Per-session locks ordering appends and manifest rewrites.
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionCache {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            sessions: RwLock::new(HashMap::new()),
            hydrated: AtomicBool::new(false),
            hydration: Mutex::new(()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Load all session rows into the cache, once per process.
    ///
    /// Failure propagates to the caller but leaves the hydrated flag unset,
    /// so the next caller retries from scratch.
    pub async fn ensure_hydrated(&self) -> Result<()> {
        if self.hydrated.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.hydration.lock().await;
        if self.hydrated.load(Ordering::Acquire) {
            return Ok(());
        }

        let rows = self
            .records
            .fetch_all()
            .await
            .map_err(|e| Error::record_store("*", format!("hydration failed: {e}")))?;
        let count = rows.len();

        let mut sessions = self.sessions.write().await;
        for row in rows {
            // Entries adopted before hydration finished are newer than the
            // snapshot; keep them.
            sessions.entry(row.id.clone()).or_insert(row);
        }
        drop(sessions);

        self.hydrated.store(true, Ordering::Release);
        info!(sessions = count, "Session cache hydrated");
        Ok(())
    }

    /// Resolve a session: cached entry, then hydrate-once and recheck, then
    /// a direct fetch-by-id against the record store.
    ///
    /// The direct fetch covers rows created by another process after this
    /// process's hydration snapshot; a row found that way is adopted into
    /// the cache.
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return Ok(Some(session.clone()));
            }
        }

        self.ensure_hydrated().await?;

        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return Ok(Some(session.clone()));
            }
        }

        let fetched = self
            .records
            .fetch_by_id(id)
            .await
            .map_err(|e| Error::record_store(id, e.to_string()))?;
        if let Some(session) = fetched {
            debug!(session_id = %id, "Adopted session row missed by hydration snapshot");
            let mut sessions = self.sessions.write().await;
            let entry = sessions.entry(id.to_string()).or_insert(session);
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    /// Commit a session into the cache. Callers do this only after the
    /// durable writes for the mutation have succeeded.
    pub async fn commit(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    /// Drop a session from the cache. Returns the evicted record, if any.
    pub async fn remove(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    /// Drop every cached session.
    pub async fn clear(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
    }

    /// Snapshot of all cached sessions (hydrating first).
    pub async fn snapshot(&self) -> Result<Vec<Session>> {
        self.ensure_hydrated().await?;
        let sessions = self.sessions.read().await;
        Ok(sessions.values().cloned().collect())
    }

    /// The lock ordering mutations for one session id.
    pub async fn session_lock(&self, id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.locks.write().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }
}
