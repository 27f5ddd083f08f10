// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! brood - clients and tools for a brood master

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod error;
mod output;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use commands::{check, status, threader, worker};
use tracing_subscriber::EnvFilter;

use crate::error::BroodError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "brood",
    version,
    about = "Brood - distributed generational optimization"
)]
struct Cli {
    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute single tasks for a master
    Worker(worker::WorkerArgs),
    /// Execute whole chunks on a local thread pool
    Threader(threader::ThreaderArgs),
    /// Show a running master's progress
    Status(status::StatusArgs),
    /// Validate a run file
    CheckConfig(check::CheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    let format = cli.format;
    let result = match cli.command {
        Commands::Worker(args) => {
            interruptible().and_then(|stop| worker::handle(&args, stop).map(|v| output::print(&v, format)))
        }
        Commands::Threader(args) => {
            interruptible().and_then(|stop| threader::handle(&args, stop).map(|v| output::print(&v, format)))
        }
        Commands::Status(args) => status::handle(&args).map(|v| output::print(&v, format)),
        Commands::CheckConfig(args) => check::handle(&args).map(|v| output::print(&v, format)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", e);
            ExitCode::from(u8::try_from(e.code).unwrap_or(1))
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Stop flag raised by Ctrl-C; the current task still completes
fn interruptible() -> Result<Arc<AtomicBool>, BroodError> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current task...");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| BroodError::new(format!("could not install the interrupt handler: {}", e), 1))?;
    Ok(stop)
}
