// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mproc` command implementations.
//!
//! `exec` launches a worker with no ledger consultation; `run` memoizes
//! through the completion ledger; `queue` additionally arbitrates an
//! execution slot against every other mproc process sharing the base
//! directory. All three mirror the worker's exit code; ledger hits exit 0
//! without launching anything.

use crate::exit_error::ExitError;
use crate::params::CliParams;
use mp_core::{
    resolve_file_name, Clock, JobDescriptor, ProcessorRegistry, ProcessorSpec, ResourceUsage,
    SystemClock,
};
use mp_daemon::{
    build_worker_command, supervise, JobId, JobOutcome, JobState, MprocConfig, SupervisorConfig,
};
use mp_ledger::{BackoffPolicy, ClaimStore, CompletionLedger, MonitorClaim, SlotArbiter};
use tokio_util::sync::CancellationToken;

/// Loaded configuration plus the processor registry.
pub struct Context {
    pub config: MprocConfig,
    pub registry: ProcessorRegistry,
}

impl Context {
    pub fn load() -> Result<Self, ExitError> {
        let config = MprocConfig::load().map_err(ExitError::failure)?;
        std::fs::create_dir_all(&config.base_dir).map_err(ExitError::failure)?;
        let registry =
            ProcessorRegistry::load(&config.processor_paths).map_err(ExitError::failure)?;
        Ok(Self { config, registry })
    }

    /// Validate arguments against the processor's contract and resolve
    /// `.prv` input stubs to concrete files.
    fn descriptor(
        &self,
        processor: &str,
        params: &CliParams,
    ) -> Result<(&ProcessorSpec, JobDescriptor), ExitError> {
        let spec = self.registry.spec(processor).map_err(ExitError::failure)?;
        let mut desc = JobDescriptor::from_args(spec, &params.values).map_err(ExitError::failure)?;
        let search = self.config.prv_search_paths();
        for paths in desc.inputs.values_mut() {
            for path in paths.iter_mut() {
                if path.as_os_str().is_empty() {
                    continue;
                }
                *path = resolve_file_name(path, &search).map_err(ExitError::failure)?;
            }
        }
        Ok((spec, desc))
    }
}

/// `mproc exec` — run the worker directly, no ledger, no slot.
pub async fn exec(processor: &str, raw_params: &[String]) -> Result<(), ExitError> {
    let ctx = Context::load()?;
    let params = CliParams::parse(raw_params).map_err(ExitError::failure)?;
    let (spec, desc) = ctx.descriptor(processor, &params)?;
    let outcome = run_worker(&ctx, spec, &desc, params.request_num_threads, None).await?;
    finish(outcome)
}

/// `mproc run` — ledger check first, record after success.
pub async fn run(processor: &str, raw_params: &[String]) -> Result<(), ExitError> {
    let ctx = Context::load()?;
    let params = CliParams::parse(raw_params).map_err(ExitError::failure)?;
    let (spec, desc) = ctx.descriptor(processor, &params)?;

    let ledger = CompletionLedger::in_base(&ctx.config.base_dir).map_err(ExitError::failure)?;
    if !params.force_run && ledger.already_completed(&desc, spec) {
        println!("Process already completed: {}", processor);
        return Ok(());
    }

    let outcome = run_worker(&ctx, spec, &desc, params.request_num_threads, None).await?;
    if outcome.state == JobState::Succeeded {
        ledger.record_completed(&desc, spec);
    }
    finish(outcome)
}

/// `mproc queue` — wait for an execution slot, then run memoized.
pub async fn queue(processor: &str, raw_params: &[String]) -> Result<(), ExitError> {
    let ctx = Context::load()?;
    let params = CliParams::parse(raw_params).map_err(ExitError::failure)?;
    let (spec, desc) = ctx.descriptor(processor, &params)?;

    let ledger = CompletionLedger::in_base(&ctx.config.base_dir).map_err(ExitError::failure)?;
    if !params.force_run && ledger.already_completed(&desc, spec) {
        println!("Process already completed: {}", processor);
        return Ok(());
    }

    let store = ClaimStore::in_base(&ctx.config.base_dir).map_err(ExitError::failure)?;
    let arbiter = SlotArbiter::new(store, ctx.config.budget, ctx.config.stale_timeout);
    let threads = params.request_num_threads.unwrap_or(1);
    let claim = MonitorClaim::new(
        processor,
        ResourceUsage::one_process(threads),
        desc.parameters.clone(),
        SystemClock.epoch_ms(),
    );

    // The backoff loop blocks between attempts; keep it off the runtime
    // threads. Abort as soon as a competing process finishes this job.
    let guard = {
        let arbiter = arbiter.clone();
        let ledger = ledger.clone();
        let abort_desc = desc.clone();
        let abort_spec = spec.clone();
        let force_run = params.force_run;
        tokio::task::spawn_blocking(move || {
            arbiter.claim_with_backoff(&claim, BackoffPolicy::default(), || {
                !force_run && ledger.already_completed(&abort_desc, &abort_spec)
            })
        })
        .await
        .map_err(ExitError::failure)?
        .map_err(ExitError::failure)?
    };

    let Some(guard) = guard else {
        if !params.force_run && ledger.already_completed(&desc, spec) {
            println!("Process completed elsewhere: {}", processor);
            return Ok(());
        }
        return Err(ExitError::failure("timed out waiting for an execution slot"));
    };

    let outcome = run_worker(&ctx, spec, &desc, params.request_num_threads, Some(guard)).await?;
    if outcome.state == JobState::Succeeded {
        ledger.record_completed(&desc, spec);
    }
    finish(outcome)
}

/// `mproc list-processors` — sorted names, one per line.
pub fn list_processors() -> Result<(), ExitError> {
    let ctx = Context::load()?;
    for name in ctx.registry.names() {
        println!("{}", name);
    }
    Ok(())
}

/// `mproc spec [processor]` — pretty JSON of one spec, or all of them.
pub fn spec(processor: Option<&str>) -> Result<(), ExitError> {
    let ctx = Context::load()?;
    let json = match processor {
        Some(name) => {
            let spec = ctx.registry.spec(name).map_err(ExitError::failure)?;
            serde_json::to_string_pretty(spec)
        }
        None => {
            let all: Vec<&ProcessorSpec> = ctx.registry.iter().collect();
            serde_json::to_string_pretty(&serde_json::json!({ "processors": all }))
        }
    }
    .map_err(ExitError::failure)?;
    println!("{}", json);
    Ok(())
}

async fn run_worker(
    ctx: &Context,
    spec: &ProcessorSpec,
    desc: &JobDescriptor,
    request_num_threads: Option<u32>,
    claim: Option<mp_ledger::ClaimGuard>,
) -> Result<JobOutcome, ExitError> {
    let tempdir = ctx.config.tempdir_root().join(JobId::new().as_str());
    std::fs::create_dir_all(&tempdir).map_err(ExitError::failure)?;
    let cmd = build_worker_command(spec, desc, &tempdir, request_num_threads);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let limit = ResourceUsage {
        processes: 1,
        threads: request_num_threads.unwrap_or(0),
        ram_bytes: ctx.config.budget.max_ram_bytes,
    };
    let outcome = supervise(&cmd, desc, &limit, claim, &SupervisorConfig::default(), cancel)
        .await
        .map_err(ExitError::failure)?;

    if let Err(err) = std::fs::remove_dir_all(&tempdir) {
        eprintln!("mproc: could not remove tempdir {}: {}", tempdir.display(), err);
    }
    Ok(outcome)
}

/// Map a worker outcome to the process exit contract.
fn finish(outcome: JobOutcome) -> Result<(), ExitError> {
    match outcome.state {
        JobState::Succeeded => Ok(()),
        _ => {
            // a clean exit that still failed (missing outputs) must not
            // exit 0
            let code = match outcome.exit_code {
                Some(code) if code != 0 => code,
                _ => crate::exit_error::FAILURE_CODE,
            };
            Err(ExitError::new(
                code,
                outcome.detail.unwrap_or_else(|| "process failed".to_string()),
            ))
        }
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
