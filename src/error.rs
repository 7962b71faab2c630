//! Error types for memoir.

use thiserror::Error;

/// Result type alias using memoir Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for archive operations
#[derive(Error, Debug)]
pub enum Error {
    // Session resolution errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // Persistence errors
    #[error("Record store error for session {session_id}: {message}")]
    RecordStore { session_id: String, message: String },

    #[error("Blob store error at {path}: {message}")]
    BlobStore { path: String, message: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a record-store error carrying the session it concerns.
    pub fn record_store(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordStore {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Create a blob-store error carrying the object path it concerns.
    pub fn blob_store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BlobStore {
            path: path.into(),
            message: message.into(),
        }
    }
}
