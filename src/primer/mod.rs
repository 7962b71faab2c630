//! Memory primer: a derived markdown summary per handle bucket.
//!
//! The primer condenses every user-authored turn across a handle's sessions
//! into a fixed set of biographical stages, to be fed back into future
//! conversation prompts as context. It is a streaming classifier plus a
//! bounded-retention aggregator, re-run from scratch on every finalize.
//! Each rebuild is O(total turns for the handle), which is fine at a
//! handful of sessions per handle.

mod render;
mod stages;

pub use render::*;
pub use stages::*;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::store::BlobStore;
use crate::types::{handle_bucket, Primer, Role, Session, UNASSIGNED_HANDLE};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::session::SessionCache;

/// Builds, persists, and caches primer documents per handle bucket.
///
/// The per-handle cache mirrors the session cache's hydrate-once pattern,
/// scoped per key: the first reader of a bucket loads (or rebuilds) under
/// that bucket's slot lock, and concurrent readers join the in-flight load.
pub struct PrimerService {
    cache: Arc<SessionCache>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<ArchiveConfig>,
    slots: RwLock<HashMap<String, Arc<Mutex<Option<Primer>>>>>,
}

impl PrimerService {
    pub fn new(
        cache: Arc<SessionCache>,
        blobs: Arc<dyn BlobStore>,
        config: Arc<ArchiveConfig>,
    ) -> Self {
        Self {
            cache,
            blobs,
            config,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild the primer for a handle from all of its sessions and persist
    /// the document.
    pub async fn rebuild(&self, handle: Option<&str>) -> Result<Primer> {
        let bucket = handle_bucket(handle);
        let slot = self.slot(&bucket).await;
        let mut guard = slot.lock().await;
        let primer = self.rebuild_locked(&bucket).await?;
        *guard = Some(primer.clone());
        Ok(primer)
    }

    /// Fetch the primer for a handle: cached state, then the stored blob,
    /// then a full rebuild.
    pub async fn get(&self, handle: Option<&str>) -> Result<Primer> {
        let bucket = handle_bucket(handle);
        let slot = self.slot(&bucket).await;
        let mut guard = slot.lock().await;
        if let Some(primer) = guard.as_ref() {
            return Ok(primer.clone());
        }

        if let Some(primer) = self.load_stored(&bucket).await? {
            debug!(bucket = %bucket, "Primer loaded from blob store");
            *guard = Some(primer.clone());
            return Ok(primer);
        }

        let primer = self.rebuild_locked(&bucket).await?;
        *guard = Some(primer.clone());
        Ok(primer)
    }

    /// Drop a handle's primer: stored blob and cached state.
    pub async fn remove(&self, handle: Option<&str>) -> Result<()> {
        let bucket = handle_bucket(handle);
        let slot = self.slot(&bucket).await;
        let mut guard = slot.lock().await;
        let path = self.config.primer_path(&bucket);
        self.blobs
            .delete(&path)
            .await
            .map_err(|e| Error::blob_store(&path, e.to_string()))?;
        *guard = None;
        Ok(())
    }

    async fn slot(&self, bucket: &str) -> Arc<Mutex<Option<Primer>>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(bucket) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(bucket.to_string()).or_default())
    }

    /// The rebuild body; callers hold the bucket's slot lock.
    async fn rebuild_locked(&self, bucket: &str) -> Result<Primer> {
        let mut sessions: Vec<Session> = self
            .cache
            .snapshot()
            .await?
            .into_iter()
            .filter(|s| handle_bucket(s.user_handle.as_deref()) == bucket)
            .collect();
        // Cache snapshots come out of a hash map; sort for determinism.
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let updated_at = Utc::now();
        let input = aggregate(bucket, &sessions, &self.config, updated_at);
        let text = render_primer(&input);

        let path = self.config.primer_path(bucket);
        let url = crate::session::write_artifact(
            self.blobs.as_ref(),
            &path,
            text.clone().into_bytes(),
            "text/markdown; charset=utf-8",
        )
        .await?;

        if bucket == UNASSIGNED_HANDLE {
            // Drop the single-file primer left over from the pre-handle
            // storage layout.
            let legacy = &self.config.legacy_primer_path;
            self.blobs
                .delete(legacy)
                .await
                .map_err(|e| Error::blob_store(legacy, e.to_string()))?;
        }

        info!(bucket = %bucket, sessions = sessions.len(), "Primer rebuilt");
        Ok(Primer {
            text,
            url: Some(url),
            updated_at: Some(updated_at),
        })
    }

    async fn load_stored(&self, bucket: &str) -> Result<Option<Primer>> {
        let path = self.config.primer_path(bucket);
        let bytes = self
            .blobs
            .get(&path)
            .await
            .map_err(|e| Error::blob_store(&path, e.to_string()))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let listed = self
            .blobs
            .list_by_prefix(&path, 1)
            .await
            .map_err(|e| Error::blob_store(&path, e.to_string()))?;
        let object = listed.into_iter().next();
        Ok(Some(Primer {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            url: object.as_ref().map(|o| o.url.clone()),
            updated_at: object.map(|o| o.uploaded_at),
        }))
    }
}

/// Fold a bucket's sessions into renderer input.
///
/// The latest session's sentences are processed first so they claim the
/// per-stage dedupe set and land in the latest bucket; older sessions fill
/// the archive in chronological order.
fn aggregate(
    bucket: &str,
    sessions: &[Session],
    config: &ArchiveConfig,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> PrimerInput {
    let latest_id = sessions.last().map(|s| s.id.clone());
    let latest_label = sessions.last().map(|s| {
        s.title
            .clone()
            .unwrap_or_else(|| format!("Session on {}", s.created_at.format("%Y-%m-%d")))
    });

    let mut buckets: Vec<StageBuckets> = STAGE_ORDER.iter().map(|_| StageBuckets::default()).collect();
    let mut seen: Vec<HashSet<String>> = STAGE_ORDER.iter().map(|_| HashSet::new()).collect();

    let mut ordered: Vec<&Session> = Vec::with_capacity(sessions.len());
    if let Some(latest) = sessions.last() {
        ordered.push(latest);
    }
    ordered.extend(sessions.iter().take(sessions.len().saturating_sub(1)));

    for session in ordered {
        let is_latest = Some(&session.id) == latest_id.as_ref();
        for turn in &session.turns {
            if turn.role != Role::User {
                continue;
            }
            for sentence in split_sentences(&turn.text) {
                if sentence.chars().count() < config.primer_sentence_min_len {
                    continue;
                }
                let polished = polish_sentence(&sentence, config.primer_sentence_max_len);
                let stage = classify_sentence(&polished);
                let idx = stage.index();
                if !seen[idx].insert(polished.clone()) {
                    continue;
                }
                let bucket_pair = &mut buckets[idx];
                if is_latest {
                    if bucket_pair.latest.len() < config.primer_latest_cap {
                        bucket_pair.latest.push(polished);
                    }
                } else if bucket_pair.archive.len() < config.primer_archive_cap {
                    bucket_pair.archive.push(polished);
                }
            }
        }
    }

    PrimerInput {
        bucket: bucket.to_string(),
        session_count: sessions.len(),
        latest_label,
        stages: buckets,
        updated_at,
        highlight_cap: config.primer_highlight_cap,
    }
}
