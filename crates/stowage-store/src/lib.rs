//! Stowage Store -- Profile-isolated persistent settings with deferred flushing.
//!
//! This crate provides the persistence layer for per-player settings. A single
//! [`Store`](store::Store) context owns three cooperating layers:
//!
//! - [`disk`]: the in-memory `key -> string` map for the active profile, with a
//!   dirty flag and an interval-gated flush to a [`BlobStore`](storage::BlobStore).
//! - [`profile`]: the active profile identifier, a generation counter bumped on
//!   every switch, and the subscriber fan-out.
//! - [`savable`]: typed cache front-ends (`SavableInt`, `SavableBool`, ...) that
//!   lazily parse their value and write through on every set.
//!
//! The whole map is persisted as one flat string per profile via [`codec`].
//!
//! # Quick Start
//!
//! ```
//! use stowage_store::prelude::*;
//!
//! let mut store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
//! let mut score = SavableInt::new("score", 42);
//!
//! assert_eq!(score.get(&store), 42);
//! score.increment(&mut store);
//! assert_eq!(score.get(&store), 43);
//!
//! // Nothing is durable until the host tick flushes it.
//! assert_eq!(store.blob_store().write_count(), 0);
//! assert!(store.maybe_flush(10.0));
//! assert_eq!(store.blob_store().write_count(), 1);
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod disk;
pub mod profile;
pub mod savable;
pub mod storage;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by storage collaborators and configuration loading.
///
/// These never cross the [`Store`](store::Store) boundary: the store logs
/// storage failures and carries on. They are surfaced by the collaborators
/// themselves (e.g. [`FileBlobStore::open`](storage::FileBlobStore::open)).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing document or a config document is not valid JSON.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of range.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::codec::{BlobFormat, DelimitedCodec, LengthPrefixedCodec};
    pub use crate::config::StoreConfig;
    pub use crate::disk::DiskBackend;
    pub use crate::profile::{ProfileId, ProfileRegistry, ProfileSubscriber};
    pub use crate::savable::{
        Savable, SavableBool, SavableEnum, SavableFloat, SavableInt, SavableString,
        SavableValue,
    };
    pub use crate::storage::{BlobStore, FileBlobStore, MemoryBlobStore};
    pub use crate::store::Store;
    pub use crate::StoreError;
}
