// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mp_core::FakeClock;
use tempfile::tempdir;

fn claim(processor: &str) -> MonitorClaim {
    MonitorClaim::new(
        processor,
        ResourceUsage::one_process(1),
        BTreeMap::new(),
        1_000_000,
    )
}

#[test]
fn write_creates_named_claim_file() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let c = claim("bandpass_filter");

    let guard = store.write(&c).unwrap();
    let name = guard.path().file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("bandpass_filter_"));
    assert!(name.ends_with(".json"));
    assert!(guard.path().exists());
}

#[test]
fn list_roundtrips_claim_contents() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let c = claim("bandpass_filter");
    let _guard = store.write(&c).unwrap();

    let listed = store.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1, c);
}

#[test]
fn list_skips_garbage_and_foreign_files() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    std::fs::write(dir.path().join("junk.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    let _guard = store.write(&claim("p")).unwrap();

    assert_eq!(store.list().len(), 1);
}

#[test]
fn guard_drop_removes_file() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let guard = store.write(&claim("p")).unwrap();
    let path = guard.path().to_path_buf();

    drop(guard);
    assert!(!path.exists());
}

#[test]
fn release_tolerates_already_removed_file() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let guard = store.write(&claim("p")).unwrap();
    std::fs::remove_file(guard.path()).unwrap();
    guard.release();
}

#[test]
fn touch_refreshes_mtime() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let guard = store.write(&claim("p")).unwrap();

    let old = std::fs::metadata(guard.path()).unwrap().modified().unwrap();
    let back_dated = old - Duration::from_secs(60);
    let file = std::fs::OpenOptions::new()
        .append(true)
        .open(guard.path())
        .unwrap();
    file.set_modified(back_dated).unwrap();

    guard.touch().unwrap();
    let refreshed = std::fs::metadata(guard.path()).unwrap().modified().unwrap();
    assert!(refreshed > back_dated + Duration::from_secs(30));
}

#[test]
fn purge_removes_timed_out_claims() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let guard = store.write(&claim("p")).unwrap();

    // age the heartbeat past the timeout
    let file = std::fs::OpenOptions::new()
        .append(true)
        .open(guard.path())
        .unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(120))
        .unwrap();

    assert_eq!(store.purge_stale(Duration::from_secs(10)), 1);
    assert!(store.list().is_empty());
}

#[test]
fn purge_keeps_fresh_claims_of_live_processes() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let _guard = store.write(&claim("p")).unwrap();

    // our own pid is alive and the heartbeat is fresh
    assert_eq!(store.purge_stale(Duration::from_secs(10)), 0);
    assert_eq!(store.list().len(), 1);
}

#[test]
fn purge_ages_heartbeats_against_the_injected_clock() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(SystemClock.epoch_ms());
    let store = ClaimStore::with_clock(dir.path(), clock.clone()).unwrap();
    let _guard = store.write(&claim("p")).unwrap();

    // fresh heartbeat, live pid: kept
    assert_eq!(store.purge_stale(Duration::from_secs(10)), 0);

    // no filesystem mutation, only time passing
    clock.advance(Duration::from_secs(60));
    assert_eq!(store.purge_stale(Duration::from_secs(10)), 1);
    assert!(store.list().is_empty());
}

#[test]
fn purge_removes_claims_of_dead_pids() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let mut c = claim("p");
    // pid_max on Linux defaults below 4 million; this pid cannot exist
    c.pid = u32::MAX - 1;
    let guard = store.write(&c).unwrap();

    assert_eq!(store.purge_stale(Duration::from_secs(3600)), 1);
    assert!(!guard.path().exists());
}

#[test]
fn pid_alive_for_self_and_not_for_bogus() {
    assert!(pid_alive(std::process::id()));
    assert!(!pid_alive(u32::MAX - 1));
}
