//! Shared types for memoir.
//!
//! These types are used by the cache, the coordinators, and the store seams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bucket key used for sessions that carry no user handle.
pub const UNASSIGNED_HANDLE: &str = "unassigned";

/// Normalize a user handle for storage: trimmed and lowercased.
/// Empty or whitespace-only input maps to `None` (the unassigned bucket).
pub fn normalize_handle(handle: Option<&str>) -> Option<String> {
    let h = handle?.trim().to_lowercase();
    if h.is_empty() { None } else { Some(h) }
}

/// Resolve the primer bucket key for an optional handle.
pub fn handle_bucket(handle: Option<&str>) -> String {
    normalize_handle(handle).unwrap_or_else(|| UNASSIGNED_HANDLE.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle state of a session.
///
/// Transitions are monotonic: `InProgress → Completed → {Emailed | Error}`.
/// `Completed` is terminal when email is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Emailed,
    Error,
}

impl SessionStatus {
    /// Convert to string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Emailed => "emailed",
            SessionStatus::Error => "error",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "emailed" => Some(SessionStatus::Emailed),
            "error" => Some(SessionStatus::Error),
            _ => None,
        }
    }

    /// Whether the session can still accept a finalize transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

/// One utterance within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub audio_blob_url: Option<String>,
}

/// Named artifact URLs attached to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    pub manifest: Option<String>,
    pub transcript_txt: Option<String>,
    pub transcript_json: Option<String>,
    pub session_audio: Option<String>,
}

/// One recorded interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    /// Notification address; may be empty, in which case email is skipped.
    pub email_to: String,
    /// Normalized handle, or `None` for the unassigned bucket.
    pub user_handle: Option<String>,
    pub status: SessionStatus,
    pub duration_ms: u64,
    /// Always equal to `turns.len()` after any mutation.
    pub total_turns: usize,
    pub artifacts: Artifacts,
    pub turns: Vec<Turn>,
}

impl Session {
    /// Create a fresh in-progress session.
    pub fn new(id: String, email_to: String, user_handle: Option<String>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            title: None,
            email_to,
            user_handle,
            status: SessionStatus::InProgress,
            duration_ms: 0,
            total_turns: 0,
            artifacts: Artifacts::default(),
            turns: Vec::new(),
        }
    }

    /// Push a turn and keep `total_turns` in sync.
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.total_turns = self.turns.len();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types
// ─────────────────────────────────────────────────────────────────────────────

/// Input for appending a turn to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTurn {
    pub role: Role,
    pub text: String,
    pub audio_blob_url: Option<String>,
}

/// Input for finalizing a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// Duration reported by the client; clamped to be non-negative.
    pub client_duration_ms: i64,
    pub session_audio_url: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Types
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of an email dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailStatus {
    Sent { provider: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl EmailStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, EmailStatus::Sent { .. })
    }
}

/// Result of a finalize call.
///
/// A missing or already-terminal session yields `skipped: true` with a
/// reason rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    pub session: Option<Session>,
    pub emailed: bool,
    pub email_status: Option<EmailStatus>,
    pub skipped: bool,
    pub reason: Option<String>,
}

impl FinalizeResult {
    /// A finalize that did not run because the session was absent or terminal.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            session: None,
            emailed: false,
            email_status: None,
            skipped: true,
            reason: Some(reason.into()),
        }
    }
}

/// A derived primer document for one handle bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primer {
    pub text: String,
    pub url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest Types
// ─────────────────────────────────────────────────────────────────────────────

/// Per-turn entry within a persisted session manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// 1-based position within the session.
    pub turn: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(rename = "assistantReply", skip_serializing_if = "Option::is_none")]
    pub assistant_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Totals block within a persisted session manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestTotals {
    pub turns: usize,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// The full JSON snapshot of a session, rewritten on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub user_handle: Option<String>,
    pub title: Option<String>,
    pub status: SessionStatus,
    pub totals: ManifestTotals,
    pub artifacts: Artifacts,
    pub turns: Vec<ManifestTurn>,
}
