//! Active-profile tracking and switch fan-out.
//!
//! The [`ProfileRegistry`] owns the active [`ProfileId`], a generation counter
//! that is bumped on every activation, and the list of [`ProfileSubscriber`]s
//! notified on each switch.
//!
//! Typed front-ends ([`Savable`](crate::savable::Savable)) do not subscribe:
//! they remember the generation their cached value was read under and
//! re-fetch when the store's generation has moved on. Subscribers are for
//! everything else that derives state from the active profile.
//!
//! The full switch sequence (flush outgoing, activate, notify, reload) is
//! driven by [`Store::set_active_profile`](crate::store::Store::set_active_profile).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProfileId
// ---------------------------------------------------------------------------

/// Identifier of an isolated settings namespace.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProfileId(pub u32);

impl ProfileId {
    /// The profile active at startup and after a full reset.
    pub const DEFAULT: ProfileId = ProfileId(0);
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProfileSubscriber
// ---------------------------------------------------------------------------

/// Receives a call every time a profile is activated.
///
/// Subscribers are invoked before the new profile's data is loaded, so they
/// must not expect to read the new profile's values from inside the callback.
pub trait ProfileSubscriber {
    fn on_profile_switch(&mut self, profile: ProfileId);
}

impl<F: FnMut(ProfileId)> ProfileSubscriber for F {
    fn on_profile_switch(&mut self, profile: ProfileId) {
        self(profile)
    }
}

// ---------------------------------------------------------------------------
// ProfileRegistry
// ---------------------------------------------------------------------------

/// Active profile, switch generation, and subscriber list.
///
/// Subscribers live as long as the registry; there is no unsubscribe.
pub struct ProfileRegistry {
    active: ProfileId,
    generation: u64,
    subscribers: Vec<Box<dyn ProfileSubscriber>>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProfileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileRegistry")
            .field("active", &self.active)
            .field("generation", &self.generation)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ProfileRegistry {
    /// A registry on [`ProfileId::DEFAULT`] at generation 0, i.e. before any
    /// activation has happened.
    pub fn new() -> Self {
        Self {
            active: ProfileId::DEFAULT,
            generation: 0,
            subscribers: Vec::new(),
        }
    }

    /// The most recently activated profile.
    pub fn active_profile(&self) -> ProfileId {
        self.active
    }

    /// Number of activations so far. Cached values tagged with an older
    /// generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Add a subscriber to the end of the fan-out list.
    pub fn register(&mut self, subscriber: impl ProfileSubscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Make `profile` active, bump the generation, and notify every
    /// subscriber in registration order.
    pub fn activate(&mut self, profile: ProfileId) {
        self.active = profile;
        self.generation += 1;
        tracing::debug!(
            profile = %profile,
            generation = self.generation,
            subscribers = self.subscribers.len(),
            "profile activated"
        );
        for subscriber in &mut self.subscribers {
            subscriber.on_profile_switch(profile);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
