//! The store context shared by every typed setting.
//!
//! [`Store`] ties together the [`DiskBackend`] and the [`ProfileRegistry`].
//! One instance is created at startup and handed by reference to every
//! [`Savable`](crate::savable::Savable), replacing process-wide singletons.
//!
//! # Profile switch sequence
//!
//! [`Store::set_active_profile`] runs, in this order:
//!
//! 1. Flush the outgoing profile if it has unflushed mutations.
//! 2. Set the active profile and bump the generation.
//! 3. Notify subscribers in registration order.
//! 4. Reload the map from the new profile's blob.
//!
//! Subscribers therefore observe the switch before any of the new profile's
//! data is visible.
//!
//! # Concurrency
//!
//! The store is single-threaded: every operation takes `&self` or `&mut self`
//! and returns synchronously. A multi-threaded host should wrap the whole
//! `Store` in one mutex so a profile switch stays a single critical section.

use crate::config::StoreConfig;
use crate::disk::DiskBackend;
use crate::profile::{ProfileId, ProfileRegistry, ProfileSubscriber};
use crate::storage::BlobStore;

/// Shared persistence context: active-profile map, flush state, and profile
/// registry.
#[derive(Debug)]
pub struct Store<S> {
    disk: DiskBackend<S>,
    profiles: ProfileRegistry,
}

impl<S: BlobStore> Store<S> {
    /// Create a store and activate [`ProfileId::DEFAULT`], loading its blob.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`StoreConfig::validate`].
    pub fn new(blob_store: S, config: StoreConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("{e}");
        }
        let mut store = Self {
            disk: DiskBackend::new(blob_store, config),
            profiles: ProfileRegistry::new(),
        };
        store.activate(ProfileId::DEFAULT);
        store
    }

    // -- key/value ----------------------------------------------------------

    /// The stored string, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.disk.get(key)
    }

    /// The stored string, or `None` when the key is absent.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.disk.lookup(key)
    }

    /// Upsert in memory; the durable write is deferred to the next flush.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.disk.set(key, value);
    }

    /// Remove `key` in memory, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.disk.remove(key)
    }

    // -- flushing -----------------------------------------------------------

    /// Host tick; see [`DiskBackend::maybe_flush`].
    pub fn maybe_flush(&mut self, now: f64) -> bool {
        self.disk.maybe_flush(now)
    }

    /// Unconditional flush of the active profile.
    pub fn write(&mut self) {
        self.disk.write();
    }

    /// Unconditional flush, advancing the observed host time first.
    pub fn write_at(&mut self, now: f64) {
        self.disk.write_at(now);
    }

    // -- profiles -----------------------------------------------------------

    /// The profile whose data is currently loaded.
    pub fn active_profile(&self) -> ProfileId {
        self.profiles.active_profile()
    }

    /// Number of profile activations, including the initial one.
    pub fn generation(&self) -> u64 {
        self.profiles.generation()
    }

    /// Switch to `profile`. See the module docs for the exact sequence.
    ///
    /// Re-activating the current profile still notifies subscribers and
    /// reloads from storage.
    pub fn set_active_profile(&mut self, profile: ProfileId) {
        if self.disk.is_dirty() {
            tracing::debug!(
                profile = %self.active_profile(),
                "flushing outgoing profile before switch"
            );
            self.disk.write();
        }
        self.activate(profile);
    }

    fn activate(&mut self, profile: ProfileId) {
        self.profiles.activate(profile);
        self.disk.reload(profile);
    }

    /// Add a subscriber notified on every subsequent profile switch.
    pub fn subscribe(&mut self, subscriber: impl ProfileSubscriber + 'static) {
        self.profiles.register(subscriber);
    }

    /// Erase the active profile's persisted data, then switch to
    /// [`ProfileId::DEFAULT`].
    pub fn clear_everything(&mut self) {
        tracing::info!(profile = %self.active_profile(), "clearing profile data");
        self.disk.erase_profile();
        self.set_active_profile(ProfileId::DEFAULT);
    }

    // -- accessors ----------------------------------------------------------

    /// Whether there are mutations not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.disk.is_dirty()
    }

    /// Number of entries in the active profile.
    pub fn len(&self) -> usize {
        self.disk.len()
    }

    /// Whether the active profile has no entries.
    pub fn is_empty(&self) -> bool {
        self.disk.is_empty()
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        self.disk.config()
    }

    /// The underlying disk backend, for inspection.
    pub fn disk(&self) -> &DiskBackend<S> {
        &self.disk
    }

    /// The profile registry, for inspection.
    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// Shared access to the durable store.
    pub fn blob_store(&self) -> &S {
        self.disk.blob_store()
    }

    /// BLAKE3 digest of the active profile's entries.
    pub fn content_hash(&self) -> String {
        self.disk.content_hash()
    }

    /// Consume the store without flushing and return the blob store.
    pub fn into_blob_store(self) -> S {
        self.disk.into_blob_store()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
