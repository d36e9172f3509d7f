//! In-memory map for the active profile with deferred, interval-gated flushes.
//!
//! The [`DiskBackend`] holds every `key -> value` string of one profile.
//! Writes only touch memory and mark the map dirty; the durable write happens
//! in [`maybe_flush`](DiskBackend::maybe_flush), which the host calls once per
//! frame with its current time. A flush happens only when the map is dirty and
//! more than [`StoreConfig::flush_interval`] has passed since the last one.
//!
//! # Time
//!
//! The backend has no clock of its own. It remembers the latest host time
//! passed to [`maybe_flush`](DiskBackend::maybe_flush) and stamps mutations
//! with it. Host time must be non-decreasing.
//!
//! # Failures
//!
//! Storage errors never escape. A failed read leaves the backend with an
//! empty, *unloaded* map: reads see defaults, and flushes are skipped until a
//! later reload succeeds, so data that was never read is never overwritten.
//! A failed write is logged and counts as a completed flush (no retry).

use crate::codec::{self, Entries, LengthPrefixedCodec};
use crate::config::StoreConfig;
use crate::profile::ProfileId;
use crate::storage::BlobStore;

/// The active profile's entries plus the flush bookkeeping.
#[derive(Debug)]
pub struct DiskBackend<S> {
    blob_store: S,
    config: StoreConfig,
    profile: ProfileId,
    entries: Entries,
    /// Latest host time observed.
    now: f64,
    last_mutation_time: f64,
    last_flush_time: f64,
    /// Set by every mutation, cleared by every flush and reload.
    dirty: bool,
    /// Whether `entries` reflects the bound profile's persisted blob.
    loaded: bool,
}

impl<S: BlobStore> DiskBackend<S> {
    /// An empty, clean backend bound to [`ProfileId::DEFAULT`]. Nothing is
    /// read until the first [`reload`](Self::reload).
    pub fn new(blob_store: S, config: StoreConfig) -> Self {
        Self {
            blob_store,
            config,
            profile: ProfileId::DEFAULT,
            entries: Entries::new(),
            now: 0.0,
            last_mutation_time: 0.0,
            last_flush_time: 0.0,
            dirty: false,
            loaded: false,
        }
    }

    // -- reads --------------------------------------------------------------

    /// The stored value, or `""` when the key is absent.
    pub fn get(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or_default()
    }

    /// The stored value, distinguishing an absent key from an empty value.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` is present, even with an empty value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries in the loaded map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the loaded map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -- writes -------------------------------------------------------------

    /// Upsert `key -> value` in memory and mark the map dirty.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_owned(), value.into());
        self.touch();
    }

    /// Remove `key`, marking the map dirty if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    fn touch(&mut self) {
        self.last_mutation_time = self.now;
        self.dirty = true;
    }

    // -- profile data -------------------------------------------------------

    /// Drop the in-memory map and load `profile`'s persisted blob.
    ///
    /// Unflushed mutations are discarded; callers flush first if they care.
    /// If the read fails the map is left empty and flushes are suppressed
    /// until the next successful reload.
    pub fn reload(&mut self, profile: ProfileId) {
        self.profile = profile;
        self.entries.clear();
        self.dirty = false;

        let key = self.config.storage_key(profile);
        let blob = match self.blob_store.get_string(&key) {
            Ok(blob) => blob,
            Err(e) => {
                self.loaded = false;
                tracing::error!(
                    profile = %profile,
                    key = %key,
                    error = %e,
                    "failed to read profile blob -- flushes suspended until a reload succeeds"
                );
                return;
            }
        };

        self.entries = codec::decode_blob(&blob);
        self.loaded = true;
        tracing::info!(
            profile = %profile,
            entries = self.entries.len(),
            bytes = blob.len(),
            "profile data loaded"
        );
    }

    /// Persist an empty blob for the bound profile and discard the in-memory
    /// map together with any pending mutations.
    ///
    /// A successful erase also counts as a load: the persisted blob now
    /// matches the empty map.
    pub fn erase_profile(&mut self) {
        let key = self.config.storage_key(self.profile);
        match self.blob_store.set_string(&key, "") {
            Ok(()) => self.loaded = true,
            Err(e) => tracing::error!(
                profile = %self.profile,
                key = %key,
                error = %e,
                "failed to erase profile blob"
            ),
        }
        self.entries.clear();
        self.dirty = false;
        tracing::info!(profile = %self.profile, "profile data erased");
    }

    // -- flushing -----------------------------------------------------------

    /// Host tick. Flushes when dirty and more than the configured interval
    /// has elapsed since the last flush. Returns whether a flush happened.
    ///
    /// Never flushes an unloaded map.
    pub fn maybe_flush(&mut self, now: f64) -> bool {
        self.observe(now);
        let due = self.now - self.last_flush_time > self.config.flush_interval;
        if self.loaded && self.dirty && due {
            self.flush();
            true
        } else {
            false
        }
    }

    /// Flush immediately, dirty or not. Skipped while the map is unloaded.
    pub fn write(&mut self) {
        if self.loaded {
            self.flush();
        } else {
            tracing::warn!(
                profile = %self.profile,
                "profile data was never loaded -- refusing to overwrite it"
            );
        }
    }

    /// Same as [`write`](Self::write) but first advances the observed time.
    pub fn write_at(&mut self, now: f64) {
        self.observe(now);
        self.write();
    }

    fn observe(&mut self, now: f64) {
        if now < self.now {
            tracing::warn!(now, last = self.now, "host time went backwards -- ignoring");
            return;
        }
        self.now = now;
    }

    fn flush(&mut self) {
        let key = self.config.storage_key(self.profile);
        let blob = self.config.format.encode(&self.entries);
        match self.blob_store.set_string(&key, &blob) {
            Ok(()) => tracing::debug!(
                profile = %self.profile,
                entries = self.entries.len(),
                bytes = blob.len(),
                "profile data flushed"
            ),
            Err(e) => tracing::error!(
                profile = %self.profile,
                key = %key,
                error = %e,
                "failed to flush profile data -- not retrying"
            ),
        }
        self.last_flush_time = self.now;
        self.dirty = false;
    }

    // -- accessors ----------------------------------------------------------

    /// The profile whose data is loaded.
    pub fn profile(&self) -> ProfileId {
        self.profile
    }

    /// Whether a mutation happened since the last flush or reload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the map reflects the bound profile's persisted blob. False
    /// before the first reload and after a failed one.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Host time of the most recent mutation.
    pub fn last_mutation_time(&self) -> f64 {
        self.last_mutation_time
    }

    /// Host time of the most recent flush attempt, successful or not.
    pub fn last_flush_time(&self) -> f64 {
        self.last_flush_time
    }

    /// The configuration this backend was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shared access to the durable store.
    pub fn blob_store(&self) -> &S {
        &self.blob_store
    }

    /// Mutable access to the durable store, bypassing the in-memory map.
    pub fn blob_store_mut(&mut self) -> &mut S {
        &mut self.blob_store
    }

    /// Consume the backend, returning the durable store. Pending mutations
    /// are dropped.
    pub fn into_blob_store(self) -> S {
        self.blob_store
    }

    /// BLAKE3 hex digest of the entries, independent of insertion order.
    pub fn content_hash(&self) -> String {
        let canonical = LengthPrefixedCodec.encode(&self.entries);
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
