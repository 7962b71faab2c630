//! Durable store seams.
//!
//! The archive talks to two durable backends and one notifier, all injected
//! behind traits:
//!
//! - [`RecordStore`]: relational table of session rows, keyed by session id
//! - [`BlobStore`]: hierarchical object store for manifests, transcripts,
//!   audio, and primer documents
//! - [`EmailNotifier`]: outbound notification on finalize
//!
//! Backend client wrappers are assumed given; in-memory implementations in
//! [`memory`] back the test suite and double as zero-config defaults.

mod blob;
mod email;
mod memory;
mod record;

pub use blob::*;
pub use email::*;
pub use memory::*;
pub use record::*;

use thiserror::Error;

/// Error surfaced by a store backend.
///
/// Coordinators wrap these with session/path context before propagating.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Result type for store backend operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
