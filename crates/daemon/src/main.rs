// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mprocd — the pipeline daemon.
//!
//! Loads configuration and the processor registry, then runs the pipeline
//! loop until SIGINT or SIGTERM. Jobs in flight at shutdown are killed and
//! their claims released before the process exits.

use mp_core::ProcessorRegistry;
use mp_daemon::{MprocConfig, PipelineRunner};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = MprocConfig::load()?;
    std::fs::create_dir_all(&config.base_dir)?;

    let registry = if config.processor_paths.is_empty() {
        info!("no processor paths configured, registry is empty");
        ProcessorRegistry::default()
    } else {
        ProcessorRegistry::load(&config.processor_paths)?
    };
    info!(
        base_dir = %config.base_dir.display(),
        processors = registry.names().len(),
        max_processes = config.budget.max_processes,
        "mprocd starting"
    );

    let runner = Arc::new(PipelineRunner::new(config, registry)?);
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    let mut term = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
        info!("shutdown signal received");
        shutdown.cancel();
    });

    runner.run_loop(cancel).await;
    Ok(())
}
