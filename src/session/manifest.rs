//! Session manifest rendering and blob persistence.
//!
//! The manifest is the full JSON snapshot of one session, rewritten on every
//! mutation rather than appended to. Downstream readers consume one document
//! per session; the O(turns) write amplification is acceptable at interview
//! volumes.

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::store::BlobStore;
use crate::types::{
    ManifestTotals, ManifestTurn, Role, Session, SessionManifest,
};

/// Build the manifest snapshot for a session.
pub fn render_manifest(session: &Session) -> SessionManifest {
    let turns = session
        .turns
        .iter()
        .enumerate()
        .map(|(i, turn)| ManifestTurn {
            id: turn.id.clone(),
            role: turn.role,
            text: turn.text.clone(),
            turn: i + 1,
            transcript: match turn.role {
                Role::User => Some(turn.text.clone()),
                Role::Assistant => None,
            },
            assistant_reply: match turn.role {
                Role::Assistant => Some(turn.text.clone()),
                Role::User => None,
            },
            audio: turn.audio_blob_url.clone(),
        })
        .collect();

    SessionManifest {
        session_id: session.id.clone(),
        created_at: session.created_at,
        email: session.email_to.clone(),
        user_handle: session.user_handle.clone(),
        title: session.title.clone(),
        status: session.status,
        totals: ManifestTotals {
            turns: session.total_turns,
            duration_ms: session.duration_ms,
        },
        artifacts: session.artifacts.clone(),
        turns,
    }
}

/// Write a session's manifest to the blob store, returning the object URL.
///
/// Deletes any prior object at the path first so the rewrite is idempotent
/// and never trips duplicate/etag conflicts in the backend.
pub async fn write_manifest(
    blobs: &dyn BlobStore,
    config: &ArchiveConfig,
    session: &Session,
) -> Result<String> {
    let path = config.manifest_path(&session.id);
    let manifest = render_manifest(session);
    let bytes = serde_json::to_vec_pretty(&manifest)?;

    blobs
        .delete(&path)
        .await
        .map_err(|e| Error::blob_store(&path, e.to_string()))?;
    let blob = blobs
        .put(&path, bytes, "application/json")
        .await
        .map_err(|e| Error::blob_store(&path, e.to_string()))?;
    Ok(blob.url)
}

/// Delete-then-put helper for non-manifest session artifacts.
pub async fn write_artifact(
    blobs: &dyn BlobStore,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String> {
    blobs
        .delete(path)
        .await
        .map_err(|e| Error::blob_store(path, e.to_string()))?;
    let blob = blobs
        .put(path, bytes, content_type)
        .await
        .map_err(|e| Error::blob_store(path, e.to_string()))?;
    Ok(blob.url)
}
