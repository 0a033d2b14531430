// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline runner: drives jobs through ledger check, slot claim and
//! supervised execution, and picks up new work from a file-drop commands
//! directory.
//!
//! One runner serves both entry points: the CLI runs a single request to
//! completion with [`PipelineRunner::run_request`], the daemon loops in
//! [`PipelineRunner::run_loop`] spawning one task per dropped request.

use crate::command::build_worker_command;
use crate::env::MprocConfig;
use crate::protocol::{JobId, JobState, JobStatusEntry, RunRequest, StatusSnapshot};
use crate::supervisor::{supervise, SupervisorConfig, SupervisorError};
use mp_core::{
    resolve_file_name, Clock, DescriptorError, JobDescriptor, ProcessorRegistry, RegistryError,
    ResolveError, ResourceUsage, SystemClock,
};
use mp_ledger::{
    BackoffPolicy, ClaimError, ClaimGuard, CompletionLedger, MonitorClaim, SlotArbiter,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("error preparing runner directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Shared runner state. Wrap in an [`Arc`] to drive the daemon loop.
pub struct PipelineRunner {
    config: MprocConfig,
    registry: ProcessorRegistry,
    ledger: CompletionLedger,
    arbiter: SlotArbiter,
    backoff: BackoffPolicy,
    supervisor: SupervisorConfig,
    clock: SystemClock,
    jobs: Mutex<Vec<JobStatusEntry>>,
}

impl PipelineRunner {
    pub fn new(config: MprocConfig, registry: ProcessorRegistry) -> Result<Self, RunnerError> {
        let ledger =
            CompletionLedger::in_base(&config.base_dir).map_err(|source| RunnerError::Setup {
                path: config.base_dir.clone(),
                source,
            })?;
        let store = mp_ledger::ClaimStore::in_base(&config.base_dir)?;
        for dir in [config.commands_dir(), config.tempdir_root()] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| RunnerError::Setup { path: dir.clone(), source })?;
        }
        let arbiter = SlotArbiter::new(store, config.budget, config.stale_timeout);
        Ok(Self {
            config,
            registry,
            ledger,
            arbiter,
            backoff: BackoffPolicy::default(),
            supervisor: SupervisorConfig::default(),
            clock: SystemClock,
            jobs: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &MprocConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn set_backoff(&mut self, policy: BackoffPolicy) {
        self.backoff = policy;
    }

    pub fn set_supervisor_config(&mut self, config: SupervisorConfig) {
        self.supervisor = config;
    }

    /// Current view of every job this runner has seen.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            jobs: self.jobs.lock().clone(),
        }
    }

    /// Run one request to its terminal state. Errors reaching the job
    /// (unknown processor, invalid arguments, claim I/O) surface as `Err`
    /// and are also recorded on the status board.
    pub async fn run_request(
        &self,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<JobStatusEntry, RunnerError> {
        let id = JobId::new();
        self.upsert(self.entry(&id, request, JobState::Queued, None, false));
        match self.drive(&id, request, cancel).await {
            Ok(entry) => {
                self.upsert(entry.clone());
                Ok(entry)
            }
            Err(err) => {
                self.upsert(self.entry(
                    &id,
                    request,
                    JobState::Failed,
                    Some(err.to_string()),
                    false,
                ));
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        id: &JobId,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<JobStatusEntry, RunnerError> {
        let spec = self.registry.spec(&request.processor_name)?;
        let mut desc = JobDescriptor::from_args(spec, &request.parameters)?;
        self.resolve_inputs(&mut desc)?;

        if !request.force_run && self.ledger.already_completed(&desc, spec) {
            info!(processor = %spec.name, "already completed, skipping");
            return Ok(self.entry(id, request, JobState::Succeeded, None, true));
        }

        let Some(guard) = self.claim_slot(request, &desc, &cancel).await? else {
            if cancel.is_cancelled() {
                return Ok(self.entry(
                    id,
                    request,
                    JobState::Killed,
                    Some("cancelled before launch".to_string()),
                    false,
                ));
            }
            if !request.force_run && self.ledger.already_completed(&desc, spec) {
                info!(processor = %spec.name, "completed elsewhere while waiting");
                return Ok(self.entry(id, request, JobState::Succeeded, None, true));
            }
            return Ok(self.entry(
                id,
                request,
                JobState::Failed,
                Some("timed out waiting for an execution slot".to_string()),
                false,
            ));
        };

        // slot is ours: launching covers tempdir and command preparation,
        // running begins when the worker is handed to the supervisor
        self.upsert(self.entry(id, request, JobState::Launching, None, false));
        let tempdir = self.config.tempdir_root().join(id.as_str());
        std::fs::create_dir_all(&tempdir).map_err(|source| RunnerError::Setup {
            path: tempdir.clone(),
            source,
        })?;
        let cmd = build_worker_command(spec, &desc, &tempdir, request.request_num_threads);
        self.upsert(self.entry(id, request, JobState::Running, None, false));

        // Per-job enforcement: the thread count it asked for, and the
        // global RAM ceiling. Zero fields stay unenforced.
        let limit = ResourceUsage {
            processes: 1,
            threads: request.request_num_threads.unwrap_or(0),
            ram_bytes: self.config.budget.max_ram_bytes,
        };
        let outcome = supervise(
            &cmd,
            &desc,
            &limit,
            Some(guard),
            &self.supervisor,
            cancel.clone(),
        )
        .await?;

        if outcome.state == JobState::Succeeded {
            self.ledger.record_completed(&desc, spec);
        }
        if let Err(err) = std::fs::remove_dir_all(&tempdir) {
            debug!(path = %tempdir.display(), error = %err, "error removing job tempdir");
        }
        let mut entry = self.entry(id, request, outcome.state, outcome.detail, false);
        entry.exit_code = outcome.exit_code;
        Ok(entry)
    }

    /// Wait for an execution slot, re-checking for cancellation and
    /// elsewhere-completion between attempts. `Ok(None)` means no slot:
    /// the caller distinguishes why.
    async fn claim_slot(
        &self,
        request: &RunRequest,
        desc: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<ClaimGuard>, RunnerError> {
        let threads = request.request_num_threads.unwrap_or(1);
        let claim = MonitorClaim::new(
            &request.processor_name,
            ResourceUsage::one_process(threads),
            desc.parameters.clone(),
            self.clock.epoch_ms(),
        );
        let deadline = std::time::Instant::now() + self.backoff.max_wait;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(guard) = self.arbiter.try_claim(&claim)? {
                return Ok(Some(guard));
            }
            if !request.force_run
                && self
                    .registry
                    .spec(&request.processor_name)
                    .map(|spec| self.ledger.already_completed(desc, spec))
                    .unwrap_or(false)
            {
                return Ok(None);
            }
            if std::time::Instant::now() >= deadline {
                warn!(processor = %request.processor_name, "gave up waiting for a slot");
                return Ok(None);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.backoff.next_delay()) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    /// Daemon loop: poll the commands directory, spawn one task per
    /// dropped request, and keep the status snapshot on disk current.
    /// Returns once `cancel` fires and every in-flight job has wound down.
    pub async fn run_loop(self: &Arc<Self>, cancel: CancellationToken) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut tick = tokio::time::interval(self.config.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    for request in self.take_dropped_requests() {
                        let runner = Arc::clone(self);
                        let job_cancel = cancel.clone();
                        tasks.spawn(async move {
                            if let Err(err) = runner.run_request(&request, job_cancel).await {
                                warn!(error = %err, "job failed before launch");
                            }
                        });
                    }
                    while let Some(finished) = tasks.try_join_next() {
                        if let Err(err) = finished {
                            warn!(error = %err, "job task panicked");
                        }
                    }
                    self.write_snapshot();
                }
            }
        }

        // Workers see the same token and are already being killed; wait
        // for their claims to be cleaned up.
        while tasks.join_next().await.is_some() {}
        self.write_snapshot();
        info!("runner stopped");
    }

    /// Claim dropped request files: each is removed before parsing so two
    /// runners never execute the same drop twice.
    fn take_dropped_requests(&self) -> Vec<RunRequest> {
        let dir = self.config.commands_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut requests = Vec::new();
        for path in paths {
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            if std::fs::remove_file(&path).is_err() {
                // someone else claimed it first
                continue;
            }
            match serde_json::from_str::<RunRequest>(&text) {
                Ok(request) => {
                    info!(path = %path.display(), processor = %request.processor_name, "picked up request");
                    requests.push(request);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "discarding unparsable request");
                }
            }
        }
        requests
    }

    fn write_snapshot(&self) {
        let body = serde_json::to_string_pretty(&self.snapshot()).unwrap_or_default();
        if let Err(err) = std::fs::write(self.config.state_file(), body) {
            warn!(error = %err, "error writing status snapshot");
        }
    }

    fn resolve_inputs(&self, desc: &mut JobDescriptor) -> Result<(), RunnerError> {
        let search = self.config.prv_search_paths();
        for paths in desc.inputs.values_mut() {
            for path in paths.iter_mut() {
                if path.as_os_str().is_empty() {
                    continue;
                }
                *path = resolve_file_name(path, &search)?;
            }
        }
        Ok(())
    }

    fn entry(
        &self,
        id: &JobId,
        request: &RunRequest,
        state: JobState,
        detail: Option<String>,
        cached: bool,
    ) -> JobStatusEntry {
        JobStatusEntry {
            id: id.clone(),
            processor_name: request.processor_name.clone(),
            state,
            exit_code: None,
            detail,
            cached,
        }
    }

    fn upsert(&self, entry: JobStatusEntry) {
        let mut jobs = self.jobs.lock();
        if let Some(existing) = jobs.iter_mut().find(|j| j.id == entry.id) {
            *existing = entry;
        } else {
            jobs.push(entry);
        }
    }
}

/// Drop a request into the commands directory for a running daemon to
/// pick up. Returns the dropped file's path.
pub fn enqueue(config: &MprocConfig, request: &RunRequest) -> std::io::Result<PathBuf> {
    let dir = config.commands_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.json", JobId::new()));
    let body = serde_json::to_string_pretty(request).unwrap_or_default();
    std::fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
