//! Fixed-timestep host loop that drives the store's deferred flush.
//!
//! The [`HostLoop`] plays the role of the game's per-frame update. Each tick:
//!
//! 1. All registered systems run in declaration order, each receiving a
//!    mutable reference to the [`Store`] and the simulation time at the start
//!    of the tick.
//! 2. The tick counter advances.
//! 3. [`Store::maybe_flush`] is called with the new simulation time.
//!
//! Simulation time is `tick_count * fixed_dt`, so flush timing is a pure
//! function of the tick count and replays identically.
//!
//! # Example
//!
//! ```
//! use stowage_host::host_loop::{HostConfig, HostLoop};
//! use stowage_store::prelude::*;
//!
//! let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
//! let mut host = HostLoop::new(store, HostConfig::default());
//!
//! host.add_system("play_time", |store, now| {
//!     store.set("play_time", format!("{now:.2}"));
//! });
//!
//! // 6 seconds at 60 Hz: exactly one flush once 5 seconds have passed.
//! let flushes = host.run_ticks(360);
//! assert_eq!(flushes, 1);
//!
//! let store = host.shutdown();
//! assert_eq!(store.blob_store().write_count(), 2);
//! ```

use std::time::{Duration, Instant};

use stowage_store::storage::BlobStore;
use stowage_store::store::Store;

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep host loop.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for HostConfig {
    /// Defaults to 60 Hz (1/60 second per tick).
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the tick (systems + flush check).
    pub total_time: Duration,
    /// Time spent in the flush check, including the write if one happened.
    pub flush_time: Duration,
    /// Whether this tick performed a durable write.
    pub flushed: bool,
}

// ---------------------------------------------------------------------------
// SystemFn
// ---------------------------------------------------------------------------

/// A per-frame system: reads and writes settings through the store.
///
/// The second argument is the simulation time at the start of the tick.
pub type SystemFn<S> = fn(&mut Store<S>, f64);

struct RegisteredSystem<S> {
    name: String,
    func: SystemFn<S>,
}

// ---------------------------------------------------------------------------
// HostLoop
// ---------------------------------------------------------------------------

/// Owns the [`Store`] and ticks it at a fixed rate.
pub struct HostLoop<S> {
    store: Store<S>,
    systems: Vec<RegisteredSystem<S>>,
    tick_counter: u64,
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl<S: BlobStore> HostLoop<S> {
    /// Create a host loop around `store`. The tick counter starts at 0.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(store: Store<S>, config: HostConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            store,
            systems: Vec::new(),
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system to run each tick, after those already registered.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn<S>) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Execute one tick. Returns whether the store flushed.
    pub fn tick(&mut self) -> bool {
        let tick_start = Instant::now();
        let now = self.sim_time();
        let mut system_times = Vec::with_capacity(self.systems.len());

        for system in &self.systems {
            let sys_start = Instant::now();
            (system.func)(&mut self.store, now);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }

        self.tick_counter += 1;

        let flush_start = Instant::now();
        let flushed = self.store.maybe_flush(self.sim_time());
        let flush_time = flush_start.elapsed();

        if flushed {
            tracing::trace!(tick = self.tick_counter, ?flush_time, "store flushed");
        }

        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            flush_time,
            flushed,
        };

        flushed
    }

    /// Run `count` ticks. Returns how many of them flushed.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut flushes = 0u64;
        for _ in 0..count {
            if self.tick() {
                flushes += 1;
            }
        }
        flushes
    }

    /// Force a final write at the current simulation time and hand back the
    /// store.
    pub fn shutdown(mut self) -> Store<S> {
        let now = self.sim_time();
        self.store.write_at(now);
        tracing::info!(
            ticks = self.tick_counter,
            profile = %self.store.active_profile(),
            "host loop shut down"
        );
        self.store
    }

    // -- accessors ----------------------------------------------------------

    /// Number of ticks completed.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Computed as `tick_count * fixed_dt` to avoid drift from repeated
    /// addition.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    /// Simulated seconds per tick.
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Shared access to the driven store.
    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    /// Mutable access for setup, profile switches, and tests.
    pub fn store_mut(&mut self) -> &mut Store<S> {
        &mut self.store
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    /// Timings from the most recent tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_store::prelude::*;

    fn host() -> HostLoop<MemoryBlobStore> {
        let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
        HostLoop::new(store, HostConfig::default())
    }

    // -- 1. Construction ----------------------------------------------------

    #[test]
    fn new_host_starts_at_zero() {
        let host = host();
        assert_eq!(host.tick_count(), 0);
        assert_eq!(host.sim_time(), 0.0);
        assert_eq!(host.system_count(), 0);
    }

    #[test]
    fn default_config_is_60hz() {
        let expected = 1.0 / 60.0;
        assert!((HostConfig::default().fixed_dt - expected).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn zero_dt_panics() {
        let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
        let _host = HostLoop::new(store, HostConfig { fixed_dt: 0.0 });
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn infinity_dt_panics() {
        let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
        let _host = HostLoop::new(
            store,
            HostConfig {
                fixed_dt: f64::INFINITY,
            },
        );
    }

    // -- 2. System registration ---------------------------------------------

    #[test]
    fn add_systems_in_order() {
        let mut host = host();
        host.add_system("alpha", |_s, _t| {});
        host.add_system("beta", |_s, _t| {});
        assert_eq!(host.system_names(), vec!["alpha", "beta"]);
    }

    #[test]
    #[should_panic(expected = "duplicate system name")]
    fn duplicate_system_name_panics() {
        let mut host = host();
        host.add_system("settings", |_s, _t| {});
        host.add_system("settings", |_s, _t| {});
    }

    // -- 3. Ticking ---------------------------------------------------------

    #[test]
    fn systems_run_in_registration_order() {
        let mut host = host();
        host.add_system("first", |s, _t| s.set("order", "first"));
        host.add_system("second", |s, _t| {
            let seen = s.get("order").to_owned();
            s.set("order", format!("{seen},second"));
        });
        host.tick();
        assert_eq!(host.store().get("order"), "first,second");
    }

    #[test]
    fn systems_receive_start_of_tick_time() {
        let mut host = HostLoop::new(
            Store::new(MemoryBlobStore::new(), StoreConfig::default()),
            HostConfig { fixed_dt: 0.5 },
        );
        host.add_system("clock", |s, now| s.set("now", now.to_string()));
        host.run_ticks(3);
        assert_eq!(host.store().get("now"), "1");
        assert_eq!(host.sim_time(), 1.5);
    }

    #[test]
    fn idle_host_never_flushes() {
        let mut host = host();
        assert_eq!(host.run_ticks(1_000), 0);
        assert_eq!(host.store().blob_store().write_count(), 0);
    }

    #[test]
    fn diagnostics_report_flush_tick() {
        let mut host = HostLoop::new(
            Store::new(MemoryBlobStore::new(), StoreConfig::default()),
            HostConfig { fixed_dt: 1.0 },
        );
        host.add_system("writer", |s, _t| s.set("k", "v"));

        for _ in 0..5 {
            assert!(!host.tick());
            assert!(!host.last_diagnostics().flushed);
        }
        assert!(host.tick());
        let diag = host.last_diagnostics();
        assert!(diag.flushed);
        assert_eq!(diag.system_times.len(), 1);
        assert_eq!(diag.system_times[0].0, "writer");
    }

    #[test]
    fn shutdown_forces_write() {
        let mut host = host();
        host.store_mut().set("k", "v");
        host.run_ticks(10);
        let store = host.shutdown();
        assert_eq!(store.blob_store().write_count(), 1);
        assert!(!store.is_dirty());
    }
}
