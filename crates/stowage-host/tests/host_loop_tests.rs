//! Integration tests for the host loop driving a file-backed store.

use std::path::Path;

use stowage_host::prelude::*;

// ---------------------------------------------------------------------------
// Test systems
// ---------------------------------------------------------------------------

fn frame_counter_system<S: BlobStore>(store: &mut Store<S>, _now: f64) {
    let mut frames = SavableInt::new("frames", 0);
    frames.increment(store);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn flushes_are_batched_by_interval() {
    let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
    let mut host = HostLoop::new(store, HostConfig { fixed_dt: 0.25 });
    host.add_system("frames", frame_counter_system);

    // 20 seconds of ticks with a 5 second interval.
    let flushes = host.run_ticks(80);
    assert!((3..=4).contains(&flushes), "got {flushes} flushes");

    let store = host.shutdown();
    let reopened = Store::new(store.into_blob_store(), StoreConfig::default());
    assert_eq!(SavableInt::new("frames", 0).get(&reopened), 80);
}

#[test]
fn file_store_roundtrip_through_host() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let store = stowage_host::open_file_store(&path, None).unwrap();
    let mut host = HostLoop::new(store, HostConfig::default());
    host.add_system("frames", frame_counter_system);
    host.run_ticks(30);
    host.shutdown();

    let store = stowage_host::open_file_store(&path, None).unwrap();
    assert_eq!(SavableInt::new("frames", 0).get(&store), 30);
}

#[test]
fn config_file_selects_delimited_format() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("store.json");
    std::fs::write(&config_path, r#"{ "format": "delimited", "key_prefix": "slot" }"#).unwrap();

    let mut store =
        stowage_host::open_file_store(dir.path().join("blobs.json"), Some(&config_path)).unwrap();
    store.set("k", "v");
    store.write();

    assert_eq!(store.blob_store().get_string("slot0").unwrap(), "k::v``");
}

#[test]
fn bad_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("store.json");
    std::fs::write(&config_path, r#"{ "flush_interval": -3 }"#).unwrap();

    let err = stowage_host::load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("invalid store config"));
}

#[test]
fn missing_config_file_is_an_error() {
    let err = stowage_host::load_config(Path::new("/nonexistent/store.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read store config"));
}

#[test]
fn profile_switch_mid_run_keeps_profiles_apart() {
    let store = Store::new(MemoryBlobStore::new(), StoreConfig::default());
    let mut host = HostLoop::new(store, HostConfig::default());
    host.add_system("frames", frame_counter_system);

    host.run_ticks(10);
    host.store_mut().set_active_profile(ProfileId(1));
    host.run_ticks(4);
    host.store_mut().set_active_profile(ProfileId(0));

    assert_eq!(host.store().get("frames"), "10");
    host.store_mut().set_active_profile(ProfileId(1));
    assert_eq!(host.store().get("frames"), "4");
}
