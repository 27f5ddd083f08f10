// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `brood threader` - work whole chunks on a local thread pool

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use brood_core::adapters::NullHistory;
use brood_core::bench::{BenchBackend, RankedPool};
use brood_core::{History, RunConfig, ThreadedBackend, ThreadedConfig};
use brood_daemon::JsonlHistory;
use clap::Args;
use tracing::info;

use crate::client::{self, ClientError, Supervision};
use crate::error::BroodError;
use crate::output::StatsView;

#[derive(Args)]
pub struct ThreaderArgs {
    /// Run file (TOML) shared with the master
    pub config: PathBuf,

    /// Master address, overriding [network].listen
    #[arg(long)]
    pub master: Option<String>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Append family records to this JSON-lines file
    #[arg(long)]
    pub history: Option<PathBuf>,
}

pub fn handle(args: &ThreaderArgs, stop: Arc<AtomicBool>) -> Result<StatsView, BroodError> {
    let config = RunConfig::load(&args.config)
        .map_err(|e| BroodError::invalid_run_file(&args.config, &e))?;
    let addr = client::master_addr(args.master.as_deref(), &config);
    work(args, &config, &addr, stop).map_err(|e| BroodError::explain(&e, &addr))
}

fn backend_config(args: &ThreaderArgs, config: &RunConfig) -> ThreadedConfig {
    let defaults = ThreadedConfig::default();
    ThreadedConfig {
        threads: args.threads.unwrap_or(defaults.threads),
        max_tasks: config.chunks.max_tasks_per_chunk,
        max_exchange: config.chunks.max_individuals_exchanged_per_sync,
        poll_interval: client::poll_interval(),
        ..defaults
    }
}

fn work(
    args: &ThreaderArgs,
    config: &RunConfig,
    addr: &str,
    stop: Arc<AtomicBool>,
) -> Result<StatsView, ClientError> {
    let history: Arc<dyn History> = match &args.history {
        Some(path) => Arc::new(JsonlHistory::open(path)?),
        None => Arc::new(NullHistory),
    };
    let backend = ThreadedBackend::new(
        backend_config(args, config),
        Box::new(RankedPool::new(config.job.pool_size)),
        history,
    )?;
    info!(threads = backend.config().threads, "thread pool ready");

    let (upstream, id) = client::attach(addr, &config.secret(), &client::worker_options())?;
    let supervision = Supervision::start(config.heartbeat, Arc::clone(&upstream), id, Arc::clone(&stop))?;

    let breeder = BenchBackend::from_problem(&config.problem);
    let outcome = backend.run(upstream.as_ref(), id, &breeder, &stop);

    if let Some(failure) = supervision.finish() {
        return Err(ClientError::Heartbeat(failure));
    }
    Ok(StatsView(outcome?))
}

#[cfg(test)]
#[path = "threader_tests.rs"]
mod tests;
