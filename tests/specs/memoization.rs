//! Memoization specs.
//!
//! A job that already ran with identical inputs, outputs and parameters
//! is satisfied from the completion ledger; changing any input file makes
//! it a fresh job again.

use crate::prelude::*;
use tempfile::tempdir;

fn copy_processor() -> ProcessorSpec {
    processor("copy", "cp $source$ $dest$", &["source"], &["dest"])
}

#[tokio::test(flavor = "multi_thread")]
async fn second_identical_run_is_memoized() {
    let base = tempdir().unwrap();
    let source = base.path().join("in.dat");
    let dest = base.path().join("out.dat");
    std::fs::write(&source, "signal").unwrap();

    let runner = runner(base.path(), ResourceBudget::default(), vec![copy_processor()]);
    let req = request(
        "copy",
        &[
            ("source", &source.display().to_string()),
            ("dest", &dest.display().to_string()),
        ],
    );

    let first = runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.state, JobState::Succeeded);
    assert!(!first.cached);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "signal");

    let second = runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.state, JobState::Succeeded);
    assert!(second.cached);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_marker_is_canonical_json() {
    let base = tempdir().unwrap();
    let source = base.path().join("in.dat");
    let dest = base.path().join("out.dat");
    std::fs::write(&source, "signal").unwrap();

    let runner = runner(base.path(), ResourceBudget::default(), vec![copy_processor()]);
    let req = request(
        "copy",
        &[
            ("source", &source.display().to_string()),
            ("dest", &dest.display().to_string()),
        ],
    );
    runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();

    let completed = base.path().join(mp_ledger::COMPLETED_DIR);
    let markers: Vec<_> = std::fs::read_dir(&completed).unwrap().flatten().collect();
    assert_eq!(markers.len(), 1);

    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(markers[0].path()).unwrap()).unwrap();
    assert_eq!(body["processor_name"], "copy");
    assert!(body["pipeline_version"].is_string());
    assert!(body["inputs"]["source"]["size"].as_u64().unwrap() > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_input_is_a_fresh_job() {
    let base = tempdir().unwrap();
    let source = base.path().join("in.dat");
    let dest = base.path().join("out.dat");
    std::fs::write(&source, "signal").unwrap();

    let runner = runner(base.path(), ResourceBudget::default(), vec![copy_processor()]);
    let req = request(
        "copy",
        &[
            ("source", &source.display().to_string()),
            ("dest", &dest.display().to_string()),
        ],
    );
    runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();

    // different content, different size: the old marker must not match
    std::fs::write(&source, "signal v2 with more bytes").unwrap();
    let rerun = runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rerun.state, JobState::Succeeded);
    assert!(!rerun.cached);
    assert_eq!(
        std::fs::read_to_string(&dest).unwrap(),
        "signal v2 with more bytes"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_output_invalidates_the_marker() {
    let base = tempdir().unwrap();
    let source = base.path().join("in.dat");
    let dest = base.path().join("out.dat");
    std::fs::write(&source, "signal").unwrap();

    let runner = runner(base.path(), ResourceBudget::default(), vec![copy_processor()]);
    let req = request(
        "copy",
        &[
            ("source", &source.display().to_string()),
            ("dest", &dest.display().to_string()),
        ],
    );
    runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();

    std::fs::remove_file(&dest).unwrap();
    let rerun = runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();
    assert!(!rerun.cached);
    assert!(dest.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn force_run_ignores_the_marker() {
    let base = tempdir().unwrap();
    let source = base.path().join("in.dat");
    let dest = base.path().join("out.dat");
    std::fs::write(&source, "signal").unwrap();

    let runner = runner(base.path(), ResourceBudget::default(), vec![copy_processor()]);
    let mut req = request(
        "copy",
        &[
            ("source", &source.display().to_string()),
            ("dest", &dest.display().to_string()),
        ],
    );
    runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();

    req.force_run = true;
    let rerun = runner
        .run_request(&req, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rerun.state, JobState::Succeeded);
    assert!(!rerun.cached);
}
