//! Finalize coordinator.
//!
//! Closes a session: clamps the reported duration, pairs turns into rounds,
//! builds transcript artifacts, derives a title, dispatches the notification
//! email, and transitions status. Transitions are monotonic:
//! `in_progress → completed → {emailed | error}`; a session already in a
//! terminal state is never regressed or re-finalized.

use crate::anomaly::{AnomalyKind, AnomalyRegistry};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::store::{BlobStore, EmailNotifier, RecordStore};
use crate::types::{
    EmailStatus, FinalizeRequest, FinalizeResult, Role, Session, SessionStatus, Turn,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use super::{write_artifact, write_manifest, SessionCache};

/// One (user, assistant) round within the structured transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRound {
    pub round: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
}

/// The structured transcript document persisted alongside the plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDoc {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub title: Option<String>,
    pub rounds: Vec<TranscriptRound>,
}

/// Pair turns into (user, assistant) rounds by position.
///
/// A user turn opens a round; an immediately following assistant turn closes
/// it. Out-of-order turns still land in a round of their own rather than
/// being dropped.
pub fn pair_rounds(turns: &[Turn]) -> Vec<TranscriptRound> {
    let mut rounds: Vec<TranscriptRound> = Vec::new();
    for turn in turns {
        match turn.role {
            Role::User => rounds.push(TranscriptRound {
                round: rounds.len() + 1,
                user: Some(turn.text.clone()),
                assistant: None,
            }),
            Role::Assistant => match rounds.last_mut() {
                Some(open) if open.assistant.is_none() => {
                    open.assistant = Some(turn.text.clone());
                }
                _ => rounds.push(TranscriptRound {
                    round: rounds.len() + 1,
                    user: None,
                    assistant: Some(turn.text.clone()),
                }),
            },
        }
    }
    rounds
}

/// Render the plain-text transcript from paired rounds.
pub fn render_transcript_text(rounds: &[TranscriptRound]) -> String {
    let mut out = String::new();
    for round in rounds {
        if let Some(user) = &round.user {
            out.push_str("You: ");
            out.push_str(user);
            out.push('\n');
        }
        if let Some(assistant) = &round.assistant {
            out.push_str("Assistant: ");
            out.push_str(assistant);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Derive a session title from its user turns.
///
/// Takes the first user sentence of usable length, truncated; falls back to
/// a date-based default when no turn yields one.
pub fn derive_title(session: &Session, config: &ArchiveConfig) -> String {
    for turn in &session.turns {
        if turn.role != Role::User {
            continue;
        }
        for sentence in crate::primer::split_sentences(&turn.text) {
            if sentence.chars().count() >= config.primer_sentence_min_len {
                return crate::primer::polish_sentence(&sentence, config.title_max_len);
            }
        }
    }
    format!("Conversation on {}", session.created_at.format("%Y-%m-%d"))
}

/// Whether a string looks enough like an email address to attempt a send.
pub fn plausible_email(address: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    });
    re.is_match(address.trim())
}

/// Coordinates the multi-stage finalize workflow.
pub struct FinalizeCoordinator {
    cache: Arc<SessionCache>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    email: Arc<dyn EmailNotifier>,
    anomalies: Arc<AnomalyRegistry>,
    config: Arc<ArchiveConfig>,
}

impl FinalizeCoordinator {
    pub fn new(
        cache: Arc<SessionCache>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        email: Arc<dyn EmailNotifier>,
        anomalies: Arc<AnomalyRegistry>,
        config: Arc<ArchiveConfig>,
    ) -> Self {
        Self {
            cache,
            records,
            blobs,
            email,
            anomalies,
            config,
        }
    }

    /// Finalize a session.
    ///
    /// A missing session yields a skipped result rather than an error: the
    /// session may already have been finalized or cleaned up concurrently.
    /// Email provider failure moves the session to error status but the call
    /// itself still succeeds. The caller is responsible for triggering the
    /// primer rebuild afterwards.
    pub async fn finalize(
        &self,
        session_id: &str,
        request: FinalizeRequest,
    ) -> Result<FinalizeResult> {
        let lock = self.cache.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = match self.cache.get(session_id).await? {
            Some(session) => session,
            None => {
                info!(session_id = %session_id, "Finalize skipped: session not found");
                return Ok(FinalizeResult::skipped("session_not_found"));
            }
        };
        if session.status.is_terminal() {
            info!(session_id = %session_id, status = session.status.as_str(),
                "Finalize skipped: session already terminal");
            return Ok(FinalizeResult::skipped("already_finalized"));
        }

        session.duration_ms = request.client_duration_ms.max(0) as u64;
        session.status = SessionStatus::Completed;
        session.title = Some(derive_title(&session, &self.config));

        let rounds = pair_rounds(&session.turns);
        let transcript_text = render_transcript_text(&rounds);
        let transcript_doc = TranscriptDoc {
            session_id: session.id.clone(),
            title: session.title.clone(),
            rounds,
        };

        let txt_path = self.config.transcript_txt_path(&session.id);
        let txt_url = write_artifact(
            self.blobs.as_ref(),
            &txt_path,
            transcript_text.clone().into_bytes(),
            "text/plain; charset=utf-8",
        )
        .await?;
        let json_path = self.config.transcript_json_path(&session.id);
        let json_url = write_artifact(
            self.blobs.as_ref(),
            &json_path,
            serde_json::to_vec_pretty(&transcript_doc)?,
            "application/json",
        )
        .await?;

        session.artifacts.transcript_txt = Some(txt_url);
        session.artifacts.transcript_json = Some(json_url);
        if let Some(audio_url) = request.session_audio_url {
            session.artifacts.session_audio = Some(audio_url);
        }

        let email_status = self.dispatch_email(&session, &transcript_text).await;
        session.status = match &email_status {
            EmailStatus::Sent { .. } => SessionStatus::Emailed,
            EmailStatus::Skipped { .. } => SessionStatus::Completed,
            EmailStatus::Failed { error } => {
                self.anomalies
                    .flag(AnomalyKind::EmailFailed, &session.id, error.clone());
                SessionStatus::Error
            }
        };

        self.records
            .upsert(&session)
            .await
            .map_err(|e| Error::record_store(session_id, e.to_string()))?;
        let manifest_url = write_manifest(self.blobs.as_ref(), &self.config, &session).await?;
        session.artifacts.manifest = Some(manifest_url);
        self.records
            .upsert(&session)
            .await
            .map_err(|e| Error::record_store(session_id, e.to_string()))?;
        self.cache.commit(session.clone()).await;

        let emailed = email_status.is_sent();
        info!(session_id = %session_id, status = session.status.as_str(), emailed,
            "Session finalized");

        Ok(FinalizeResult {
            session: Some(session),
            emailed,
            email_status: Some(email_status),
            skipped: false,
            reason: None,
        })
    }

    async fn dispatch_email(&self, session: &Session, transcript_text: &str) -> EmailStatus {
        if !plausible_email(&session.email_to) {
            return EmailStatus::Skipped {
                reason: "no plausible recipient address".to_string(),
            };
        }

        let subject = format!(
            "Your conversation: {}",
            session.title.as_deref().unwrap_or("untitled")
        );
        let status = self
            .email
            .send(session.email_to.trim(), &subject, transcript_text)
            .await;
        if let EmailStatus::Failed { error } = &status {
            warn!(session_id = %session.id, error = %error, "Email dispatch failed");
        }
        status
    }
}
