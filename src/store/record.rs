//! Record store trait: the relational backend holding one row per session.

use crate::types::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StoreResult;

/// Health report for a store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StoreHealth {
    pub fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Relational store of session rows, keyed by session id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a session row.
    async fn upsert(&self, session: &Session) -> StoreResult<Session>;

    /// Fetch one session row by id.
    async fn fetch_by_id(&self, id: &str) -> StoreResult<Option<Session>>;

    /// Fetch every session row. Used by one-time cache hydration.
    async fn fetch_all(&self) -> StoreResult<Vec<Session>>;

    /// Delete a session row. Deleting a missing row is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Backend health probe.
    async fn health(&self) -> StoreHealth;
}
