//! Stowage Host -- Per-frame driver and bootstrap for the settings store.
//!
//! This crate connects a [`Store`](stowage_store::store::Store) to a host
//! application's update loop: [`host_loop::HostLoop`] ticks at a fixed rate and
//! calls `maybe_flush` once per tick, so durable writes are batched without a
//! timer thread.
//!
//! The free functions here cover process startup: installing a `tracing`
//! subscriber and opening a file-backed store with a config file.
//!
//! # Quick Start
//!
//! ```no_run
//! use stowage_host::prelude::*;
//!
//! stowage_host::init_tracing();
//! let store = stowage_host::open_file_store("saves/settings.json", None)?;
//! let mut host = HostLoop::new(store, HostConfig::default());
//!
//! host.add_system("launches", |store, _now| {
//!     let mut launches = SavableInt::new("launches", 0);
//!     launches.get(store);
//! });
//! host.run_ticks(600);
//! host.shutdown();
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(unsafe_code)]

use std::path::Path;

use anyhow::Context;
use stowage_store::config::StoreConfig;
use stowage_store::storage::FileBlobStore;
use stowage_store::store::Store;
use tracing_subscriber::EnvFilter;

pub mod host_loop;

/// Re-export the store crate for convenience.
pub use stowage_store;

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Install a formatting subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Read a [`StoreConfig`] from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<StoreConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read store config {}", path.display()))?;
    StoreConfig::from_json_str(&text)
        .with_context(|| format!("invalid store config {}", path.display()))
}

/// Open a store backed by the JSON blob file at `path`, activating the
/// default profile. `config_path` overrides [`StoreConfig::default`].
pub fn open_file_store(
    path: impl AsRef<Path>,
    config_path: Option<&Path>,
) -> anyhow::Result<Store<FileBlobStore>> {
    let config = match config_path {
        Some(config_path) => load_config(config_path)?,
        None => StoreConfig::default(),
    };
    let path = path.as_ref();
    let blobs = FileBlobStore::open(path)
        .with_context(|| format!("failed to open blob store {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        flush_interval = config.flush_interval,
        "settings store opened"
    );
    Ok(Store::new(blobs, config))
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common host usage.
pub mod prelude {
    pub use stowage_store::prelude::*;

    pub use crate::host_loop::{HostConfig, HostLoop, SystemFn, TickDiagnostics};
}
