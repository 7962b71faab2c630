//! In-memory registry of flagged anomalies.
//!
//! Recoverable-but-unexpected conditions (a cache miss recovered by
//! resynthesis, a failed email dispatch) are recorded here for later
//! inspection. The registry is advisory: it is never part of the error
//! propagation path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use uuid::Uuid;

/// Kind of flagged anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A turn append raced session creation; a placeholder row was adopted.
    SessionResynthesized,
    /// The email provider failed; the session moved to error status.
    EmailFailed,
}

/// One recorded anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub kind: AnomalyKind,
    pub session_id: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Bounded ring buffer of anomalies.
///
/// Oldest entries are evicted once capacity is reached.
#[derive(Debug)]
pub struct AnomalyRegistry {
    entries: RwLock<VecDeque<Anomaly>>,
    capacity: usize,
}

impl AnomalyRegistry {
    /// Create a registry holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    /// Record an anomaly, evicting the oldest entry at capacity.
    pub fn flag(&self, kind: AnomalyKind, session_id: &str, detail: impl Into<String>) -> Anomaly {
        let anomaly = Anomaly {
            id: Uuid::new_v4().to_string(),
            kind,
            session_id: session_id.to_string(),
            detail: detail.into(),
            at: Utc::now(),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(anomaly.clone());
        anomaly
    }

    /// Snapshot of all recorded anomalies, oldest first.
    pub fn all(&self) -> Vec<Anomaly> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    /// Number of recorded anomalies.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
