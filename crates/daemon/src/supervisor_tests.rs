// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mp_core::{JobDescriptor, ParamSpec, ParamValue, ProcessorSpec};
use mp_ledger::{ClaimStore, MonitorClaim};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

fn sh(script: &str) -> WorkerCommand {
    WorkerCommand {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

fn spec_with_output() -> ProcessorSpec {
    ProcessorSpec {
        name: "writer".to_string(),
        version: "1".to_string(),
        description: String::new(),
        exe_command: String::new(),
        basepath: Default::default(),
        inputs: vec![],
        outputs: vec![ParamSpec {
            name: "out".to_string(),
            description: String::new(),
            optional: false,
            default_value: None,
        }],
        parameters: vec![],
    }
}

fn desc_with_output(out: &Path) -> JobDescriptor {
    let mut args: BTreeMap<String, ParamValue> = BTreeMap::new();
    args.insert(
        "out".into(),
        ParamValue::Str(out.display().to_string()),
    );
    JobDescriptor::from_args(&spec_with_output(), &args).unwrap()
}

fn desc_plain() -> JobDescriptor {
    let spec = ProcessorSpec {
        name: "noop".to_string(),
        version: "1".to_string(),
        description: String::new(),
        exe_command: String::new(),
        basepath: Default::default(),
        inputs: vec![],
        outputs: vec![],
        parameters: vec![],
    };
    JobDescriptor::from_args(&spec, &BTreeMap::new()).unwrap()
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        heartbeat: Duration::from_millis(50),
        limit_poll: Duration::from_millis(50),
        kill_grace: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn clean_exit_with_output_succeeds() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("result.txt");
    let cmd = sh(&format!("echo done > {}", out.display()));

    let outcome = supervise(
        &cmd,
        &desc_with_output(&out),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(out.exists());
}

#[tokio::test]
async fn nonzero_exit_fails() {
    let outcome = supervise(
        &sh("exit 3"),
        &desc_plain(),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.exit_code, Some(3));
    assert!(outcome.detail.unwrap().contains("code 3"));
}

#[tokio::test]
async fn clean_exit_without_output_fails() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("never_written.txt");

    let outcome = supervise(
        &sh("true"),
        &desc_with_output(&out),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Failed);
    assert!(outcome.detail.unwrap().contains("never_written.txt"));
}

#[tokio::test]
async fn stale_output_is_removed_before_launch() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.txt");
    std::fs::write(&out, "left over").unwrap();

    let outcome = supervise(
        &sh("exit 1"),
        &desc_with_output(&out),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Failed);
    // the previous run's file must not survive as a fake result
    assert!(!out.exists());
}

#[tokio::test]
async fn cancellation_kills_the_worker() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = supervise(
        &sh("sleep 30"),
        &desc_plain(),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        cancel,
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Killed);
    assert_eq!(outcome.detail.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn ram_limit_breach_kills_the_worker() {
    // Any live process holds more than one byte of RSS.
    let limit = ResourceUsage {
        processes: 1,
        threads: 0,
        ram_bytes: 1,
    };

    let outcome = supervise(
        &sh("sleep 30"),
        &desc_plain(),
        &limit,
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Killed);
    assert!(outcome.detail.unwrap().contains("resource limit"));
}

#[tokio::test]
async fn claim_is_released_on_every_outcome() {
    let dir = tempdir().unwrap();
    let store = ClaimStore::new(dir.path()).unwrap();
    let claim = MonitorClaim::new("writer", ResourceUsage::one_process(1), BTreeMap::new(), 0);
    let guard = store.write(&claim).unwrap();
    assert_eq!(store.list().len(), 1);

    let outcome = supervise(
        &sh("exit 7"),
        &desc_plain(),
        &ResourceUsage::default(),
        Some(guard),
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, JobState::Failed);
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let cmd = WorkerCommand {
        program: "/no/such/binary".to_string(),
        args: vec![],
    };
    let err = supervise(
        &cmd,
        &desc_plain(),
        &ResourceUsage::default(),
        None,
        &fast_config(),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SupervisorError::Spawn { .. }));
}
