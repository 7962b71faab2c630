//! Configuration for the session archive.

/// Configuration for the archive service and primer builder.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Notification address adopted by sessions synthesized during recovery.
    pub fallback_email: String,
    /// Blob path prefix for session-scoped objects.
    pub session_prefix: String,
    /// Blob path prefix for per-handle primer documents.
    pub primer_prefix: String,
    /// Legacy primer object path from the pre-handle storage layout.
    pub legacy_primer_path: String,
    /// Maximum latest-session sentences retained per primer stage.
    pub primer_latest_cap: usize,
    /// Maximum archive sentences retained per primer stage.
    pub primer_archive_cap: usize,
    /// Maximum cross-stage highlights in the primer's latest-session section.
    pub primer_highlight_cap: usize,
    /// Maximum sentence length in the primer, in characters.
    pub primer_sentence_max_len: usize,
    /// Minimum sentence length considered usable, in characters.
    pub primer_sentence_min_len: usize,
    /// Maximum derived title length, in characters.
    pub title_max_len: usize,
    /// Capacity of the in-memory anomaly ring buffer.
    pub anomaly_capacity: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            fallback_email: String::new(),
            session_prefix: "sessions".to_string(),
            primer_prefix: "primers".to_string(),
            legacy_primer_path: "memory_primer.md".to_string(),
            primer_latest_cap: 4,
            primer_archive_cap: 6,
            primer_highlight_cap: 6,
            primer_sentence_max_len: 200,
            primer_sentence_min_len: 12,
            title_max_len: 60,
            anomaly_capacity: 256,
        }
    }
}

impl ArchiveConfig {
    /// Blob prefix holding every object belonging to one session.
    pub fn session_dir(&self, session_id: &str) -> String {
        format!("{}/{}/", self.session_prefix, session_id)
    }

    /// Path of a session's manifest object.
    pub fn manifest_path(&self, session_id: &str) -> String {
        format!("{}/{}/manifest.json", self.session_prefix, session_id)
    }

    /// Path of a session's plain-text transcript object.
    pub fn transcript_txt_path(&self, session_id: &str) -> String {
        format!("{}/{}/transcript.txt", self.session_prefix, session_id)
    }

    /// Path of a session's structured transcript object.
    pub fn transcript_json_path(&self, session_id: &str) -> String {
        format!("{}/{}/transcript.json", self.session_prefix, session_id)
    }

    /// Path of the primer document for a handle bucket.
    pub fn primer_path(&self, bucket: &str) -> String {
        format!("{}/{}.md", self.primer_prefix, bucket)
    }
}
