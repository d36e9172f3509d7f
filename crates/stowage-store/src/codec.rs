//! Flat-string codecs for a profile's whole `key -> value` map.
//!
//! A profile is persisted as a single string blob. Two formats exist:
//!
//! - [`DelimitedCodec`]: `key<PAIR>value<RECORD>...` with two fixed sentinel
//!   sequences and no escaping. Keys or values that contain either sentinel
//!   corrupt the map on the next decode. Kept for reading legacy blobs.
//! - [`LengthPrefixedCodec`]: a header followed by `<len>:<key><len>:<value>`
//!   records. Every string round-trips. Decoding a blob without the header
//!   falls back to the delimited decoder, so legacy blobs migrate on the next
//!   flush.
//!
//! Both decoders are total: malformed input is skipped, never reported to the
//! caller. When a key appears more than once the last occurrence wins.
//!
//! # Example
//!
//! ```
//! use stowage_store::codec::DelimitedCodec;
//!
//! let codec = DelimitedCodec::default();
//! let entries = codec.decode("a::1``garbage``b::2``");
//!
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries["a"], "1");
//! assert_eq!(entries["b"], "2");
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The in-memory representation of one profile's data.
pub type Entries = HashMap<String, String>;

/// Default separator between a key and its value.
pub const DEFAULT_PAIR_DELIMITER: &str = "::";

/// Default separator between two records.
pub const DEFAULT_RECORD_DELIMITER: &str = "``";

/// Header that marks a length-prefixed blob.
pub const LENGTH_PREFIXED_HEADER: &str = "~lp1;";

// ---------------------------------------------------------------------------
// DelimitedCodec
// ---------------------------------------------------------------------------

/// Sentinel-delimited codec with no escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedCodec {
    pair_delimiter: String,
    record_delimiter: String,
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PAIR_DELIMITER, DEFAULT_RECORD_DELIMITER)
    }
}

impl DelimitedCodec {
    /// Create a codec with custom sentinels.
    ///
    /// # Panics
    ///
    /// Panics if either delimiter is empty or both are equal.
    pub fn new(pair_delimiter: &str, record_delimiter: &str) -> Self {
        assert!(
            !pair_delimiter.is_empty() && !record_delimiter.is_empty(),
            "delimiters must be non-empty"
        );
        assert_ne!(
            pair_delimiter, record_delimiter,
            "pair and record delimiters must differ"
        );
        Self {
            pair_delimiter: pair_delimiter.to_owned(),
            record_delimiter: record_delimiter.to_owned(),
        }
    }

    /// Append `key PAIR value RECORD` for every entry, in map iteration order.
    pub fn encode(&self, entries: &Entries) -> String {
        let mut out = String::new();
        for (key, value) in entries {
            out.push_str(key);
            out.push_str(&self.pair_delimiter);
            out.push_str(value);
            out.push_str(&self.record_delimiter);
        }
        out
    }

    /// Split on the record sentinel, then on the pair sentinel.
    ///
    /// Chunks that do not yield at least a key and a value (the trailing empty
    /// chunk, empty input, stray text) are skipped. Anything after a second
    /// pair sentinel inside one chunk is ignored.
    pub fn decode(&self, blob: &str) -> Entries {
        let mut entries = Entries::new();
        for chunk in blob.split(self.record_delimiter.as_str()) {
            let mut parts = chunk.split(self.pair_delimiter.as_str());
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                entries.insert(key.to_owned(), value.to_owned());
            }
        }
        entries
    }

    /// Whether `text` contains one of the sentinels and would not survive a
    /// round trip through this codec.
    pub fn collides(&self, text: &str) -> bool {
        text.contains(self.pair_delimiter.as_str()) || text.contains(self.record_delimiter.as_str())
    }
}

// ---------------------------------------------------------------------------
// LengthPrefixedCodec
// ---------------------------------------------------------------------------

/// Why a length-prefixed record could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The blob does not start with [`LENGTH_PREFIXED_HEADER`].
    #[error("blob has no length-prefixed header")]
    MissingHeader,

    /// No `:` terminates the length field.
    #[error("record at byte {offset} has no length terminator")]
    MissingLength { offset: usize },

    /// The length field is not a decimal number.
    #[error("record at byte {offset} has a malformed length {raw:?}")]
    BadLength { offset: usize, raw: String },

    /// The declared length runs past the end of the blob or splits a character.
    #[error("record at byte {offset} declares {expected} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        expected: usize,
        available: usize,
    },
}

/// Header-tagged, length-prefixed codec. Safe for arbitrary strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthPrefixedCodec;

impl LengthPrefixedCodec {
    /// Encode entries sorted by key so identical maps produce identical blobs.
    pub fn encode(&self, entries: &Entries) -> String {
        let mut sorted: Vec<(&String, &String)> = entries.iter().collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut out = String::from(LENGTH_PREFIXED_HEADER);
        for (key, value) in sorted {
            push_field(&mut out, key);
            push_field(&mut out, value);
        }
        out
    }

    /// Decode a blob, falling back to the legacy delimited format when the
    /// header is absent.
    ///
    /// On a malformed record the records decoded so far are kept and the rest
    /// of the blob is dropped with a warning. If not even the first record
    /// parses, the blob is a legacy one whose first key happens to start with
    /// the header, and it is decoded as delimited.
    pub fn decode(&self, blob: &str) -> Entries {
        let Some(body) = blob.strip_prefix(LENGTH_PREFIXED_HEADER) else {
            if !blob.is_empty() {
                tracing::debug!(
                    bytes = blob.len(),
                    "blob has no length-prefixed header -- decoding as delimited"
                );
            }
            return DelimitedCodec::default().decode(blob);
        };

        let mut entries = Entries::new();
        if let Err(e) = decode_records(body, &mut entries) {
            if entries.is_empty() {
                tracing::debug!(
                    error = %e,
                    "headed blob has no valid first record -- decoding as delimited"
                );
                return DelimitedCodec::default().decode(blob);
            }
            tracing::warn!(
                error = %e,
                recovered = entries.len(),
                "malformed length-prefixed record -- dropping the rest of the blob"
            );
        }
        entries
    }

    /// Strict decode of a headed blob, for callers that need to know whether
    /// the blob is damaged.
    pub fn try_decode(&self, blob: &str) -> Result<Entries, DecodeError> {
        let body = blob
            .strip_prefix(LENGTH_PREFIXED_HEADER)
            .ok_or(DecodeError::MissingHeader)?;
        let mut entries = Entries::new();
        decode_records(body, &mut entries)?;
        Ok(entries)
    }
}

fn push_field(out: &mut String, field: &str) {
    out.push_str(&field.len().to_string());
    out.push(':');
    out.push_str(field);
}

fn decode_records(body: &str, entries: &mut Entries) -> Result<(), DecodeError> {
    let base = LENGTH_PREFIXED_HEADER.len();
    let mut rest = body;
    while !rest.is_empty() {
        let offset = base + body.len() - rest.len();
        let key = take_field(&mut rest, offset)?;
        let offset = base + body.len() - rest.len();
        let value = take_field(&mut rest, offset)?;
        entries.insert(key.to_owned(), value.to_owned());
    }
    Ok(())
}

fn take_field<'a>(rest: &mut &'a str, offset: usize) -> Result<&'a str, DecodeError> {
    let input: &'a str = *rest;
    let colon = input
        .find(':')
        .ok_or(DecodeError::MissingLength { offset })?;
    let raw = &input[..colon];
    let len: usize = raw.parse().map_err(|_| DecodeError::BadLength {
        offset,
        raw: raw.to_owned(),
    })?;

    let tail = &input[colon + 1..];
    let field = tail.get(..len).ok_or(DecodeError::Truncated {
        offset,
        expected: len,
        available: tail.len(),
    })?;
    *rest = &tail[len..];
    Ok(field)
}

// ---------------------------------------------------------------------------
// BlobFormat
// ---------------------------------------------------------------------------

/// Which codec the store writes with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobFormat {
    /// Legacy sentinel-delimited blobs (`::` and ` `` `).
    Delimited,
    /// Length-prefixed blobs; reads legacy blobs too.
    #[default]
    LengthPrefixed,
}

impl BlobFormat {
    /// Encode `entries` in this format.
    pub fn encode(self, entries: &Entries) -> String {
        match self {
            BlobFormat::Delimited => DelimitedCodec::default().encode(entries),
            BlobFormat::LengthPrefixed => LengthPrefixedCodec.encode(entries),
        }
    }
}

/// Decode a stored blob of either format, chosen by the presence of the
/// length-prefixed header.
pub fn decode_blob(blob: &str) -> Entries {
    LengthPrefixedCodec.decode(blob)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
