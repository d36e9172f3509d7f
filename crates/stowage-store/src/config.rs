//! Store configuration.
//!
//! [`StoreConfig`] controls the flush interval, the storage key prefix for
//! profile blobs, and the blob format. It is plain serde data so hosts can
//! ship it inside their own settings files.

use serde::{Deserialize, Serialize};

use crate::codec::BlobFormat;
use crate::profile::ProfileId;
use crate::StoreError;

/// Default minimum time between two durable flushes, in host time units.
pub const DEFAULT_FLUSH_INTERVAL: f64 = 5.0;

/// Default prefix for profile blob keys (`"P0"`, `"P1"`, ...).
pub const DEFAULT_KEY_PREFIX: &str = "P";

/// Configuration for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// A dirty map is flushed only once `now - last_flush` exceeds this.
    /// Must be finite and non-negative.
    pub flush_interval: f64,
    /// Prefix joined with the profile number to address a profile's blob.
    pub key_prefix: String,
    /// Format used when flushing. Reads accept legacy blobs either way.
    pub format: BlobFormat,
}

impl Default for StoreConfig {
    /// 5 time units between flushes, `"P"` prefix, length-prefixed blobs.
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            format: BlobFormat::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a negative or non-finite interval and an empty key prefix.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.flush_interval.is_finite() || self.flush_interval < 0.0 {
            return Err(StoreError::InvalidConfig(format!(
                "flush_interval must be finite and non-negative, got {}",
                self.flush_interval
            )));
        }
        if self.key_prefix.is_empty() {
            return Err(StoreError::InvalidConfig(
                "key_prefix must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// The storage key addressing `profile`'s blob.
    pub fn storage_key(&self, profile: ProfileId) -> String {
        format!("{}{}", self.key_prefix, profile.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.flush_interval, 5.0);
        assert_eq!(config.key_prefix, "P");
        assert_eq!(config.format, BlobFormat::LengthPrefixed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn storage_key_joins_prefix_and_profile() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_key(ProfileId(0)), "P0");
        assert_eq!(config.storage_key(ProfileId(12)), "P12");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = StoreConfig::from_json_str(r#"{ "flush_interval": 1.5 }"#).unwrap();
        assert_eq!(config.flush_interval, 1.5);
        assert_eq!(config.key_prefix, "P");
    }

    #[test]
    fn json_selects_format() {
        let config = StoreConfig::from_json_str(r#"{ "format": "delimited" }"#).unwrap();
        assert_eq!(config.format, BlobFormat::Delimited);
    }

    #[test]
    fn negative_interval_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "flush_interval": -1.0 }"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn empty_prefix_rejected() {
        let config = StoreConfig {
            key_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = StoreConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
