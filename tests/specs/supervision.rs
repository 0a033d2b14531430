//! Supervision specs.
//!
//! A worker that violates its resource limits is killed, leaves no
//! completion marker, and frees its slot for the next job.

use crate::prelude::*;
use serial_test::serial;
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread")]
#[serial(scenarios)]
async fn memory_violation_kills_without_recording_completion() {
    let base = tempdir().unwrap();
    // a one-byte RAM ceiling that every live process violates
    let budget = ResourceBudget {
        max_processes: 2,
        max_ram_bytes: 1,
        ..ResourceBudget::default()
    };
    let runner = runner(
        base.path(),
        budget,
        vec![processor("spin", "sleep 30", &[], &[])],
    );

    let started = std::time::Instant::now();
    let entry = runner
        .run_request(&request("spin", &[]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entry.state, JobState::Killed);
    assert!(entry.detail.unwrap().contains("resource limit"));
    // killed promptly, not after the worker's natural 30s
    assert!(started.elapsed() < Duration::from_secs(10));

    let completed = base.path().join(mp_ledger::COMPLETED_DIR);
    assert_eq!(std::fs::read_dir(&completed).unwrap().flatten().count(), 0);
    let running = base.path().join(mp_ledger::RUNNING_DIR);
    assert_eq!(std::fs::read_dir(&running).unwrap().flatten().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_kills_in_flight_jobs_and_releases_claims() {
    let base = tempdir().unwrap();
    let runner = runner(
        base.path(),
        ResourceBudget::default(),
        vec![processor("spin", "sleep 30", &[], &[])],
    );
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let entry = runner
        .run_request(&request("spin", &[]), cancel)
        .await
        .unwrap();
    assert_eq!(entry.state, JobState::Killed);

    let running = base.path().join(mp_ledger::RUNNING_DIR);
    assert_eq!(std::fs::read_dir(&running).unwrap().flatten().count(), 0);
}
