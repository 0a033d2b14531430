// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mproc — run, memoize and queue pipeline processors.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_error;
mod params;

#[derive(Parser)]
#[command(name = "mproc")]
#[command(about = "Run pipeline processors with memoization and slot arbitration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a processor directly, ignoring the completion ledger
    Exec {
        /// Processor name
        processor: String,
        /// Processor arguments as --key=value
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a processor, skipping it if an identical run already completed
    Run {
        processor: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Wait for an execution slot shared with other mproc processes, then run
    Queue {
        processor: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List the names of all registered processors
    ListProcessors,
    /// Print processor specs as JSON
    Spec {
        /// Processor name; all processors when omitted
        processor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Worker output re-emits as `worker`-target events; show it by
    // default while keeping our own chatter at warn.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,worker=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Exec { processor, args } => commands::exec(processor, args).await,
        Command::Run { processor, args } => commands::run(processor, args).await,
        Command::Queue { processor, args } => commands::queue(processor, args).await,
        Command::ListProcessors => commands::list_processors(),
        Command::Spec { processor } => commands::spec(processor.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !err.message.is_empty() {
                eprintln!("mproc: {}", err);
            }
            ExitCode::from(u8::try_from(err.code).unwrap_or(255))
        }
    }
}
