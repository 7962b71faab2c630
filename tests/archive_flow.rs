//! End-to-end archive scenarios over the in-memory stores.

use async_trait::async_trait;
use memoir::anomaly::AnomalyKind;
use memoir::store::{
    BlobStore, EmailNotifier, MemoryBlobStore, MemoryRecordStore, RecordStore,
};
use memoir::types::{EmailStatus, FinalizeRequest, NewTurn, Role, SessionStatus};
use memoir::{ArchiveConfig, SessionArchive};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Notifier with a scripted outcome that records every dispatch.
struct ScriptedNotifier {
    outcome: EmailStatus,
    sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedNotifier {
    fn sending(provider: &str) -> Self {
        Self {
            outcome: EmailStatus::Sent {
                provider: provider.to_string(),
            },
            sent: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: &str) -> Self {
        Self {
            outcome: EmailStatus::Failed {
                error: error.to_string(),
            },
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EmailNotifier for ScriptedNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> EmailStatus {
        self.sent.lock().await.push((to.to_string(), subject.to_string()));
        self.outcome.clone()
    }
}

struct Harness {
    archive: SessionArchive,
    records: Arc<MemoryRecordStore>,
    blobs: Arc<MemoryBlobStore>,
    notifier: Arc<ScriptedNotifier>,
}

fn harness_with(notifier: ScriptedNotifier) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let records = Arc::new(MemoryRecordStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(notifier);
    let archive = SessionArchive::new(
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Arc::clone(&notifier) as Arc<dyn EmailNotifier>,
        ArchiveConfig::default(),
    );
    Harness {
        archive,
        records,
        blobs,
        notifier,
    }
}

fn user_turn(text: &str) -> NewTurn {
    NewTurn {
        role: Role::User,
        text: text.into(),
        audio_blob_url: None,
    }
}

fn assistant_turn(text: &str) -> NewTurn {
    NewTurn {
        role: Role::Assistant,
        text: text.into(),
        audio_blob_url: None,
    }
}

/// Strip the timestamp line so primer texts can be compared for determinism.
fn without_timestamp(text: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with("_Updated:"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn full_flow_ends_emailed() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("a@x.com", None).await.unwrap();

    h.archive
        .append_turn(&session.id, user_turn("Hello"))
        .await
        .unwrap();
    h.archive
        .append_turn(&session.id, assistant_turn("Hi there"))
        .await
        .unwrap();

    let result = h
        .archive
        .finalize_session(
            &session.id,
            FinalizeRequest {
                client_duration_ms: 1000,
                session_audio_url: None,
            },
        )
        .await
        .unwrap();

    assert!(!result.skipped);
    assert!(result.emailed);
    let finalized = result.session.unwrap();
    assert_eq!(finalized.status, SessionStatus::Emailed);
    assert_eq!(finalized.total_turns, 2);
    assert_eq!(finalized.duration_ms, 1000);

    // Transcript contains both lines in conversation order.
    let txt = h
        .blobs
        .get(&format!("sessions/{}/transcript.txt", session.id))
        .await
        .unwrap()
        .unwrap();
    let txt = String::from_utf8(txt).unwrap();
    let hello = txt.find("You: Hello").unwrap();
    let reply = txt.find("Assistant: Hi there").unwrap();
    assert!(hello < reply);

    let dispatched = h.notifier.sent.lock().await;
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, "a@x.com");
}

#[tokio::test]
async fn empty_address_skips_email() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("", None).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("Hello"))
        .await
        .unwrap();

    let result = h
        .archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();

    assert!(!result.emailed);
    assert!(matches!(
        result.email_status,
        Some(EmailStatus::Skipped { .. })
    ));
    assert_eq!(result.session.unwrap().status, SessionStatus::Completed);
    assert!(h.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn provider_failure_is_nonfatal_and_flagged() {
    let h = harness_with(ScriptedNotifier::failing("provider down"));
    let session = h.archive.create_session("a@x.com", None).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("Hello"))
        .await
        .unwrap();

    let result = h
        .archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();

    assert!(!result.emailed);
    assert_eq!(result.session.unwrap().status, SessionStatus::Error);
    let anomalies = h.archive.anomalies();
    assert!(anomalies
        .iter()
        .any(|a| a.kind == AnomalyKind::EmailFailed && a.session_id == session.id));
}

#[tokio::test]
async fn finalize_missing_session_is_skipped() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let result = h
        .archive
        .finalize_session("never-created", FinalizeRequest::default())
        .await
        .unwrap();
    assert!(result.skipped);
    assert_eq!(result.reason.as_deref(), Some("session_not_found"));
    assert!(result.session.is_none());
}

#[tokio::test]
async fn refinalize_does_not_regress_status() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("a@x.com", None).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("Hello"))
        .await
        .unwrap();

    h.archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();
    let again = h
        .archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();

    assert!(again.skipped);
    assert_eq!(again.reason.as_deref(), Some("already_finalized"));
    let current = h.archive.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(current.status, SessionStatus::Emailed);
    assert_eq!(h.notifier.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn append_to_unknown_id_synthesizes_session() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let turn = h
        .archive
        .append_turn("ghost-id", user_turn("Anyone there?"))
        .await
        .unwrap();
    assert_eq!(turn.text, "Anyone there?");

    let session = h.archive.get_session("ghost-id").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.total_turns, 1);
    assert!(h
        .archive
        .anomalies()
        .iter()
        .any(|a| a.kind == AnomalyKind::SessionResynthesized));
}

#[tokio::test]
async fn hydration_recovers_sessions_after_restart() {
    let records = Arc::new(MemoryRecordStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());

    let first = SessionArchive::new(
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Arc::new(ScriptedNotifier::sending("resend")),
        ArchiveConfig::default(),
    );
    let session = first.create_session("a@x.com", Some("Maria")).await.unwrap();
    first
        .append_turn(&session.id, user_turn("Hello"))
        .await
        .unwrap();

    // A new process over the same durable stores sees the session.
    let second = SessionArchive::new(
        Arc::clone(&records) as Arc<dyn RecordStore>,
        blobs as Arc<dyn BlobStore>,
        Arc::new(ScriptedNotifier::sending("resend")),
        ArchiveConfig::default(),
    );
    let recovered = second.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(recovered.total_turns, 1);
    assert_eq!(recovered.user_handle.as_deref(), Some("maria"));
}

#[tokio::test]
async fn list_sessions_isolates_handles() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let a = h.archive.create_session("", Some("HandleA")).await.unwrap();
    h.archive.create_session("", Some("handleb")).await.unwrap();
    h.archive.create_session("", None).await.unwrap();

    let for_a = h.archive.list_sessions(Some("handlea")).await.unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].id, a.id);

    let all = h.archive.list_sessions(None).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn manifest_rewrite_stays_internally_consistent() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("", None).await.unwrap();

    // Same turn content appended twice: two rewrites, each consistent.
    for _ in 0..2 {
        h.archive
            .append_turn(&session.id, user_turn("I grew up near the sea."))
            .await
            .unwrap();
        let bytes = h
            .blobs
            .get(&format!("sessions/{}/manifest.json", session.id))
            .await
            .unwrap()
            .unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let turns = manifest["turns"].as_array().unwrap();
        assert_eq!(manifest["totals"]["turns"].as_u64().unwrap() as usize, turns.len());
    }
}

#[tokio::test]
async fn primer_rebuild_is_deterministic() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("", Some("maria")).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("My sister and I shared a room."))
        .await
        .unwrap();
    h.archive
        .append_turn(&session.id, user_turn("I worked at the shipyard for years."))
        .await
        .unwrap();
    h.archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();

    let first = h.archive.memory_primer(Some("maria")).await.unwrap();
    assert!(first.text.contains("My sister and I shared a room"));
    assert!(first.text.contains("I worked at the shipyard for years"));

    // Rebuilding from scratch with no new turns changes nothing but the
    // timestamp line.
    let second = h.archive.rebuild_primer(Some("maria")).await.unwrap();
    assert_eq!(without_timestamp(&first.text), without_timestamp(&second.text));
}

#[tokio::test]
async fn unassigned_primer_drops_legacy_object() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    // Seed a legacy pre-handle primer blob.
    h.blobs
        .put("memory_primer.md", b"old layout".to_vec(), "text/markdown")
        .await
        .unwrap();

    let session = h.archive.create_session("", None).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("My sister and I shared a room."))
        .await
        .unwrap();
    h.archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();

    assert!(h.blobs.get("memory_primer.md").await.unwrap().is_none());
    assert!(h.blobs.get("primers/unassigned.md").await.unwrap().is_some());
}

#[tokio::test]
async fn delete_session_removes_row_blobs_and_primer() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("", Some("maria")).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("My sister and I shared a room."))
        .await
        .unwrap();
    h.archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();
    assert!(h.blobs.get("primers/maria.md").await.unwrap().is_some());

    let deleted = h.archive.delete_session(&session.id).await.unwrap();
    assert!(deleted);

    assert!(h.archive.get_session(&session.id).await.unwrap().is_none());
    assert!(h.records.fetch_by_id(&session.id).await.unwrap().is_none());
    let leftover = h
        .blobs
        .list_by_prefix(&format!("sessions/{}/", session.id), 10)
        .await
        .unwrap();
    assert!(leftover.is_empty());
    // Last session for the handle: primer removed, not rebuilt.
    assert!(h.blobs.get("primers/maria.md").await.unwrap().is_none());

    assert!(!h.archive.delete_session(&session.id).await.unwrap());
}

#[tokio::test]
async fn clear_all_sessions_empties_both_stores() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    for i in 0..3 {
        let handle = format!("h{i}");
        let session = h
            .archive
            .create_session("", Some(handle.as_str()))
            .await
            .unwrap();
        h.archive
            .append_turn(&session.id, user_turn("Hello there, old friend."))
            .await
            .unwrap();
    }

    h.archive.clear_all_sessions().await.unwrap();

    assert!(h.archive.list_sessions(None).await.unwrap().is_empty());
    assert!(h.records.is_empty().await);
    let leftover = h.blobs.list_by_prefix("sessions/", 100).await.unwrap();
    assert!(leftover.is_empty());
}

#[tokio::test]
async fn clear_all_sessions_drops_primers_too() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let session = h.archive.create_session("", Some("maria")).await.unwrap();
    h.archive
        .append_turn(&session.id, user_turn("My sister and I shared a room."))
        .await
        .unwrap();
    h.archive
        .finalize_session(&session.id, FinalizeRequest::default())
        .await
        .unwrap();
    assert!(h.blobs.get("primers/maria.md").await.unwrap().is_some());

    h.archive.clear_all_sessions().await.unwrap();

    // Stored primer is gone and the cached state no longer serves content
    // derived from the deleted session.
    assert!(h.blobs.get("primers/maria.md").await.unwrap().is_none());
    let primer = h.archive.memory_primer(Some("maria")).await.unwrap();
    assert!(!primer.text.contains("My sister and I shared a room"));
    assert!(primer.text.contains("Sessions on record: 0"));
}

#[tokio::test]
async fn health_passthrough_reports_ok() {
    let h = harness_with(ScriptedNotifier::sending("resend"));
    let health = h.archive.health().await;
    assert!(health.ok);
}
