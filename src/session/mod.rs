//! Session cache and persistence coordinators.
//!
//! ## Write path
//!
//! ```text
//! append_turn / finalize
//!   │
//!   ├─► SessionCache (resolve, hydrate-once, fetch-by-id fallback)
//!   │
//!   ├─► RecordStore upsert (row must land before the cache is committed)
//!   │
//!   ├─► BlobStore manifest rewrite (delete prior object, put snapshot)
//!   │
//!   └─► SessionCache commit (only after both durable writes succeed)
//! ```

mod append;
mod cache;
mod finalize;
mod manifest;

pub use append::*;
pub use cache::*;
pub use finalize::*;
pub use manifest::*;
