//! Typed, lazily fetched settings backed by the [`Store`].
//!
//! A [`Savable<T>`] wraps one key. The first [`get`](Savable::get) reads the
//! raw string from the store, parses it (falling back to the setting's
//! default), and caches the result. Later reads return the cached value
//! until the store's profile generation changes, at which point the next
//! read fetches again. [`set`](Savable::set) updates the cache and writes the
//! serialized value through to the store.
//!
//! # Example
//!
//! ```
//! use stowage_store::prelude::*;
//!
//! let mut store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
//! let mut muted = SavableBool::new("audio.muted", false);
//!
//! muted.toggle(&mut store);
//! assert!(muted.get(&store));
//!
//! // A different profile has its own value.
//! store.set_active_profile(ProfileId(1));
//! assert!(!muted.get(&store));
//! ```
//!
//! # Custom types
//!
//! Any `FromStr + Display + Clone` type, typically a settings enum, can be
//! stored with [`savable_via_from_str!`](crate::savable_via_from_str):
//!
//! ```
//! use std::fmt;
//! use std::str::FromStr;
//! use stowage_store::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Difficulty { Easy, Hard }
//!
//! impl fmt::Display for Difficulty {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str(match self { Difficulty::Easy => "Easy", Difficulty::Hard => "Hard" })
//!     }
//! }
//!
//! impl FromStr for Difficulty {
//!     type Err = ();
//!     fn from_str(s: &str) -> Result<Self, ()> {
//!         match s { "Easy" => Ok(Difficulty::Easy), "Hard" => Ok(Difficulty::Hard), _ => Err(()) }
//!     }
//! }
//!
//! stowage_store::savable_via_from_str!(Difficulty);
//!
//! let mut store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
//! let mut difficulty = SavableEnum::new("difficulty", Difficulty::Easy);
//! difficulty.set(&mut store, Difficulty::Hard);
//! assert_eq!(store.get("difficulty"), "Hard");
//! ```

use crate::storage::BlobStore;
use crate::store::Store;

// ---------------------------------------------------------------------------
// SavableValue
// ---------------------------------------------------------------------------

/// Conversion between a setting's value and its stored string.
pub trait SavableValue: Clone {
    /// Parse a stored string, or `None` if it is not a valid value.
    fn parse_stored(raw: &str) -> Option<Self>;

    /// The string written to the store.
    fn to_stored(&self) -> String;
}

macro_rules! savable_number {
    ($($t:ty),+) => {
        $(
            impl SavableValue for $t {
                fn parse_stored(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }

                fn to_stored(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

savable_number!(i32, i64, u32, u64, f32, f64);

impl SavableValue for bool {
    /// Case-insensitive `true` / `false`, surrounding whitespace ignored.
    fn parse_stored(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    fn to_stored(&self) -> String {
        self.to_string()
    }
}

impl SavableValue for String {
    fn parse_stored(raw: &str) -> Option<Self> {
        Some(raw.to_owned())
    }

    fn to_stored(&self) -> String {
        self.clone()
    }
}

/// Implement [`SavableValue`] through `FromStr` and `Display`.
#[macro_export]
macro_rules! savable_via_from_str {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::savable::SavableValue for $t {
                fn parse_stored(raw: &str) -> ::std::option::Option<Self> {
                    raw.parse().ok()
                }

                fn to_stored(&self) -> ::std::string::String {
                    self.to_string()
                }
            }
        )+
    };
}

// ---------------------------------------------------------------------------
// Savable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Cached<T> {
    generation: u64,
    value: T,
}

/// One typed setting stored under a single key.
#[derive(Debug, Clone)]
pub struct Savable<T> {
    key: String,
    default: T,
    cached: Option<Cached<T>>,
}

/// Integer setting with [`increment`](Savable::increment).
pub type SavableInt = Savable<i32>;
/// Float setting with [`display_rounded`](Savable::display_rounded).
pub type SavableFloat = Savable<f32>;
/// Boolean setting with [`toggle`](Savable::toggle).
pub type SavableBool = Savable<bool>;
/// Free-text setting; the stored string is used verbatim.
pub type SavableString = Savable<String>;
/// Setting for a type made savable with [`savable_via_from_str!`](crate::savable_via_from_str).
pub type SavableEnum<E> = Savable<E>;

impl<T: SavableValue> Savable<T> {
    /// A setting for `key` that reads as `default` when the key is absent or
    /// its stored string does not parse. Nothing is fetched until the first
    /// [`get`](Self::get).
    pub fn new(key: impl Into<String>, default: T) -> Self {
        Self {
            key: key.into(),
            default,
            cached: None,
        }
    }

    /// The storage key this setting reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value reported when the key is absent or unparseable.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// The current value for the active profile.
    ///
    /// Reads the store at most once per profile generation; repeated calls
    /// return the cached value.
    pub fn get<S: BlobStore>(&mut self, store: &Store<S>) -> T {
        let generation = store.generation();
        if let Some(cached) = self.cached.as_ref().filter(|c| c.generation == generation) {
            return cached.value.clone();
        }

        let value = match store.lookup(&self.key) {
            None => self.default.clone(),
            Some(raw) => T::parse_stored(raw).unwrap_or_else(|| {
                tracing::debug!(key = %self.key, raw, "stored value does not parse -- using default");
                self.default.clone()
            }),
        };
        self.cached = Some(Cached {
            generation,
            value: value.clone(),
        });
        value
    }

    /// Cache `value` and write it through to the store.
    pub fn set<S: BlobStore>(&mut self, store: &mut Store<S>, value: T) {
        store.set(&self.key, value.to_stored());
        self.cached = Some(Cached {
            generation: store.generation(),
            value,
        });
    }

    /// Read, transform, and write back. Returns the new value.
    pub fn update<S: BlobStore>(&mut self, store: &mut Store<S>, f: impl FnOnce(T) -> T) -> T {
        let next = f(self.get(store));
        self.set(store, next.clone());
        next
    }

    /// Whether the cached value is valid for the store's active profile.
    pub fn is_fetched<S: BlobStore>(&self, store: &Store<S>) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|c| c.generation == store.generation())
    }

    /// Drop the cached value so the next [`get`](Self::get) reads the store.
    pub fn on_profile_switch(&mut self) {
        self.cached = None;
    }
}

impl Savable<i32> {
    /// Add one, saturating at `i32::MAX`. Returns the new value.
    pub fn increment<S: BlobStore>(&mut self, store: &mut Store<S>) -> i32 {
        self.update(store, |v| v.saturating_add(1))
    }
}

impl Savable<bool> {
    /// Flip the value. Returns the new value.
    pub fn toggle<S: BlobStore>(&mut self, store: &mut Store<S>) -> bool {
        self.update(store, |v| !v)
    }
}

impl Savable<f32> {
    /// The value formatted with one decimal place, for display.
    pub fn display_rounded<S: BlobStore>(&mut self, store: &Store<S>) -> String {
        format!("{:.1}", self.get(store))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::profile::ProfileId;
    use crate::storage::MemoryBlobStore;

    fn store() -> Store<MemoryBlobStore> {
        Store::new(MemoryBlobStore::new(), StoreConfig::default())
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Quality {
        Low,
        High,
    }

    impl std::fmt::Display for Quality {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl std::str::FromStr for Quality {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "Low" => Ok(Quality::Low),
                "High" => Ok(Quality::High),
                other => Err(format!("unknown quality {other:?}")),
            }
        }
    }

    crate::savable_via_from_str!(Quality);

    // -- value parsing ------------------------------------------------------

    #[test]
    fn numbers_trim_whitespace() {
        assert_eq!(i32::parse_stored(" 12 "), Some(12));
        assert_eq!(f64::parse_stored("2.5\n"), Some(2.5));
        assert_eq!(u32::parse_stored("-1"), None);
    }

    #[test]
    fn bool_parse_is_case_insensitive() {
        assert_eq!(bool::parse_stored("True"), Some(true));
        assert_eq!(bool::parse_stored(" FALSE "), Some(false));
        assert_eq!(bool::parse_stored("1"), None);
        assert_eq!(true.to_stored(), "true");
    }

    // -- get ----------------------------------------------------------------

    #[test]
    fn missing_key_returns_default() {
        let store = store();
        let mut score = SavableInt::new("score", 42);
        assert_eq!(score.get(&store), 42);
    }

    #[test]
    fn unparsable_value_returns_default() {
        let mut store = store();
        store.set("score", "lots");
        let mut score = SavableInt::new("score", 7);
        assert_eq!(score.get(&store), 7);
    }

    #[test]
    fn stored_empty_string_is_not_replaced_by_default() {
        let mut store = store();
        store.set("name", "");
        let mut name = SavableString::new("name", "anon".to_owned());
        assert_eq!(name.get(&store), "");
    }

    #[test]
    fn repeated_get_serves_cache() {
        let mut store = store();
        store.set("score", "1");
        let mut score = SavableInt::new("score", 0);
        assert!(!score.is_fetched(&store));
        assert_eq!(score.get(&store), 1);
        assert!(score.is_fetched(&store));

        // Changed behind the setting's back: the cache is not re-read.
        store.set("score", "2");
        assert_eq!(score.get(&store), 1);
    }

    #[test]
    fn explicit_invalidation_refetches() {
        let mut store = store();
        let mut score = SavableInt::new("score", 0);
        assert_eq!(score.get(&store), 0);
        store.set("score", "5");
        score.on_profile_switch();
        assert_eq!(score.get(&store), 5);
    }

    // -- set ----------------------------------------------------------------

    #[test]
    fn set_writes_through_and_caches() {
        let mut store = store();
        let mut volume = SavableFloat::new("volume", 1.0);
        volume.set(&mut store, 0.25);
        assert_eq!(store.get("volume"), "0.25");
        assert!(volume.is_fetched(&store));
        assert_eq!(volume.get(&store), 0.25);
        assert!(store.is_dirty());
    }

    #[test]
    fn profile_switch_invalidates_lazily() {
        let mut store = store();
        let mut score = SavableInt::new("score", 0);
        score.set(&mut store, 10);

        store.set_active_profile(ProfileId(1));
        assert!(!score.is_fetched(&store));
        assert_eq!(score.get(&store), 0);

        store.set_active_profile(ProfileId(0));
        assert_eq!(score.get(&store), 10);
    }

    // -- specializations ----------------------------------------------------

    #[test]
    fn increment_reads_modifies_writes() {
        let mut store = store();
        let mut count = SavableInt::new("launches", 5);
        assert_eq!(count.increment(&mut store), 6);
        assert_eq!(count.increment(&mut store), 7);
        assert_eq!(store.get("launches"), "7");
    }

    #[test]
    fn increment_saturates() {
        let mut store = store();
        let mut count = SavableInt::new("launches", i32::MAX);
        assert_eq!(count.increment(&mut store), i32::MAX);
    }

    #[test]
    fn toggle_flips() {
        let mut store = store();
        let mut flag = SavableBool::new("vsync", true);
        assert!(!flag.toggle(&mut store));
        assert_eq!(store.get("vsync"), "false");
        assert!(flag.toggle(&mut store));
    }

    #[test]
    fn float_display_rounds_to_one_decimal() {
        let mut store = store();
        let mut sensitivity = SavableFloat::new("sensitivity", 0.0);
        sensitivity.set(&mut store, 1.26);
        assert_eq!(sensitivity.display_rounded(&store), "1.3");
    }

    #[test]
    fn enum_roundtrip_and_fallback() {
        let mut store = store();
        let mut quality = SavableEnum::new("quality", Quality::Low);
        quality.set(&mut store, Quality::High);
        assert_eq!(store.get("quality"), "High");

        store.set("quality", "Ultra");
        quality.on_profile_switch();
        assert_eq!(quality.get(&store), Quality::Low);
    }

    #[test]
    fn legacy_capitalized_bool_is_read() {
        let blobs = MemoryBlobStore::new().with_blob("P0", "vsync::True``");
        let store = Store::new(blobs, StoreConfig::default());
        let mut vsync = SavableBool::new("vsync", false);
        assert!(vsync.get(&store));
    }
}
