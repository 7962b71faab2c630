//! memoir - Session memory cache and durable-persistence coordinator
//!
//! This crate keeps a process-wide cache of interview sessions consistent
//! with two durable backends: a relational record store (one row per
//! session) and a blob store (per-turn manifests, transcripts, and derived
//! primer documents).
//!
//! Modules:
//!
//! - **store**: trait seams for the record store, blob store, and email
//!   notifier, plus in-memory implementations
//! - **session**: the hydrate-once session cache and the turn-append and
//!   finalize coordinators
//! - **primer**: per-handle derived memory primer documents
//! - **service**: the [`SessionArchive`] facade exposed to route handlers
//!
//! The two stores are not updated transactionally; the archive tolerates
//! eventual consistency and self-heals divergence (a miss on append
//! synthesizes a placeholder row rather than dropping the turn).

pub mod anomaly;
pub mod config;
pub mod error;
pub mod primer;
pub mod service;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::ArchiveConfig;
pub use error::{Error, Result};
pub use service::SessionArchive;
