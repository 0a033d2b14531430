//! Shared helpers for pipeline specs.

pub use mp_core::{ParamSpec, ParamValue, ProcessorRegistry, ProcessorSpec, ResourceBudget};
pub use mp_daemon::{JobState, MprocConfig, PipelineRunner, RunRequest, SupervisorConfig};
pub use mp_ledger::BackoffPolicy;
pub use std::collections::BTreeMap;
pub use std::path::Path;
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

pub fn file_param(name: &str) -> ParamSpec {
    ParamSpec {
        name: name.to_string(),
        description: String::new(),
        optional: false,
        default_value: None,
    }
}

/// A processor spec with file inputs/outputs and no scalar parameters.
pub fn processor(
    name: &str,
    exe_command: &str,
    inputs: &[&str],
    outputs: &[&str],
) -> ProcessorSpec {
    ProcessorSpec {
        name: name.to_string(),
        version: "1.0".to_string(),
        description: String::new(),
        exe_command: exe_command.to_string(),
        basepath: Default::default(),
        inputs: inputs.iter().map(|n| file_param(n)).collect(),
        outputs: outputs.iter().map(|n| file_param(n)).collect(),
        parameters: vec![],
    }
}

pub fn config(base: &Path, budget: ResourceBudget) -> MprocConfig {
    MprocConfig {
        base_dir: base.to_path_buf(),
        budget,
        poll_interval: Duration::from_millis(20),
        ..MprocConfig::default()
    }
}

/// A runner with short supervision and backoff intervals so specs finish
/// quickly.
pub fn runner(base: &Path, budget: ResourceBudget, specs: Vec<ProcessorSpec>) -> PipelineRunner {
    let registry = ProcessorRegistry::from_specs(specs);
    let mut runner = PipelineRunner::new(config(base, budget), registry).unwrap();
    runner.set_backoff(BackoffPolicy {
        base: Duration::from_millis(20),
        jitter: Duration::from_millis(10),
        max_wait: Duration::from_secs(30),
    });
    runner.set_supervisor_config(SupervisorConfig {
        heartbeat: Duration::from_millis(50),
        limit_poll: Duration::from_millis(50),
        kill_grace: Duration::from_millis(200),
    });
    runner
}

pub fn request(processor: &str, pairs: &[(&str, &str)]) -> RunRequest {
    let mut parameters: BTreeMap<String, ParamValue> = BTreeMap::new();
    for (key, value) in pairs {
        parameters.insert((*key).to_string(), ParamValue::Str((*value).to_string()));
    }
    RunRequest {
        processor_name: processor.to_string(),
        parameters,
        force_run: false,
        request_num_threads: None,
    }
}
