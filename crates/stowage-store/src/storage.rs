//! Persistent blob storage collaborators.
//!
//! A [`BlobStore`] is the only I/O boundary of the store: a string-keyed
//! table of string blobs, one blob per profile. Absent keys read as the empty
//! string.
//!
//! - [`MemoryBlobStore`]: process-local table. Counts durable writes, which
//!   makes it the collaborator of choice in tests and headless hosts.
//! - [`FileBlobStore`]: one JSON document on disk holding every blob,
//!   rewritten atomically (temp file + rename) on each write.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::StoreError;

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// String-keyed blob persistence.
pub trait BlobStore {
    /// Read the blob stored under `key`, or `""` if there is none.
    fn get_string(&self, key: &str) -> Result<String, StoreError>;

    /// Durably replace the blob stored under `key`.
    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory [`BlobStore`] that counts `set_string` calls.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
    writes: u64,
}

impl MemoryBlobStore {
    /// An empty store with a write count of zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without counting it as a durable write.
    pub fn with_blob(mut self, key: &str, blob: &str) -> Self {
        self.blobs.insert(key.to_owned(), blob.to_owned());
        self
    }

    /// Number of `set_string` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Raw blob under `key`, if one was ever written.
    pub fn blob(&self, key: &str) -> Option<&str> {
        self.blobs.get(key).map(String::as_str)
    }
}

impl BlobStore for MemoryBlobStore {
    fn get_string(&self, key: &str) -> Result<String, StoreError> {
        Ok(self.blobs.get(key).cloned().unwrap_or_default())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writes += 1;
        self.blobs.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileBlobStore
// ---------------------------------------------------------------------------

/// [`BlobStore`] backed by a single JSON file.
///
/// The file holds a JSON object mapping storage keys to blobs. It is read
/// once at [`open`](Self::open) and rewritten in full on every
/// [`set_string`](BlobStore::set_string).
#[derive(Debug)]
pub struct FileBlobStore {
    path: PathBuf,
    blobs: BTreeMap<String, String>,
}

impl FileBlobStore {
    /// Open the store at `path`. A missing file is an empty store; the file
    /// is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let blobs = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(io_error(&path, source)),
        };
        tracing::debug!(path = %path.display(), blobs = blobs.len(), "opened file blob store");
        Ok(Self { path, blobs })
    }

    /// The JSON document this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.blobs)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

impl BlobStore for FileBlobStore {
    fn get_string(&self, key: &str) -> Result<String, StoreError> {
        Ok(self.blobs.get(key).cloned().unwrap_or_default())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.blobs.insert(key.to_owned(), value.to_owned());
        self.persist()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_absent_key_is_empty() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.get_string("P0").unwrap(), "");
    }

    #[test]
    fn memory_counts_writes_but_not_seeds() {
        let mut store = MemoryBlobStore::new().with_blob("P0", "seed");
        assert_eq!(store.write_count(), 0);
        store.set_string("P0", "a").unwrap();
        store.set_string("P1", "b").unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.blob("P0"), Some("a"));
    }

    #[test]
    fn file_missing_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path().join("prefs.json")).unwrap();
        assert_eq!(store.get_string("P0").unwrap(), "");
    }

    #[test]
    fn file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = FileBlobStore::open(&path).unwrap();
        store.set_string("P0", "a::1``").unwrap();
        store.set_string("P3", "b::2``").unwrap();
        drop(store);

        let reopened = FileBlobStore::open(&path).unwrap();
        assert_eq!(reopened.get_string("P0").unwrap(), "a::1``");
        assert_eq!(reopened.get_string("P3").unwrap(), "b::2``");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn file_corrupt_document_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileBlobStore::open(&path),
            Err(StoreError::Json(_))
        ));
    }
}
