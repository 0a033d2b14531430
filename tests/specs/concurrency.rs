//! Slot arbitration specs.
//!
//! With a budget of two processes, three competing jobs run to completion
//! but never more than two at once. Each worker records how many monitor
//! claims exist while it runs, which is exactly the number of concurrent
//! workers.

use crate::prelude::*;
use serial_test::serial;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread")]
#[serial(scenarios)]
async fn budget_of_two_admits_at_most_two_of_three() {
    let base = tempdir().unwrap();
    let running_dir = base.path().join(mp_ledger::RUNNING_DIR);
    let observations = base.path().join("observations.log");
    let script = base.path().join("observe.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\nls \"$1\" | wc -l >> \"$2\"\nsleep 0.3\ntouch \"$3\"\n",
    )
    .unwrap();

    let exe = format!(
        "/bin/sh {} {} {} $slot$",
        script.display(),
        running_dir.display(),
        observations.display()
    );
    let budget = ResourceBudget {
        max_processes: 2,
        ..ResourceBudget::default()
    };
    let runner = Arc::new(runner(
        base.path(),
        budget,
        vec![processor("observe", &exe, &[], &["slot"])],
    ));

    let job = |n: u32| {
        let runner = Arc::clone(&runner);
        let slot = base.path().join(format!("slot{n}.out"));
        async move {
            let req = request("observe", &[("slot", &slot.display().to_string())]);
            runner.run_request(&req, CancellationToken::new()).await
        }
    };
    let (a, b, c) = tokio::join!(job(1), job(2), job(3));
    for entry in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(entry.state, JobState::Succeeded);
    }

    let seen: Vec<u32> = std::fs::read_to_string(&observations)
        .unwrap()
        .lines()
        .map(|l| l.trim().parse().unwrap())
        .collect();
    assert_eq!(seen.len(), 3);
    assert!(
        seen.iter().all(|&n| n >= 1 && n <= 2),
        "claim counts out of budget: {seen:?}"
    );

    // all claims cleaned up once everything finished
    let leftover = std::fs::read_dir(&running_dir).unwrap().flatten().count();
    assert_eq!(leftover, 0);
}
