// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `brood worker` - execute single tasks until the master says finish

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use brood_core::bench::BenchBackend;
use brood_core::worker::run_worker;
use brood_core::RunConfig;
use clap::Args;

use crate::client::{self, ClientError, Supervision};
use crate::error::BroodError;
use crate::output::WorkerView;

#[derive(Args)]
pub struct WorkerArgs {
    /// Run file (TOML) shared with the master
    pub config: PathBuf,

    /// Master address, overriding [network].listen
    #[arg(long)]
    pub master: Option<String>,
}

pub fn handle(args: &WorkerArgs, stop: Arc<AtomicBool>) -> Result<WorkerView, BroodError> {
    let config = RunConfig::load(&args.config)
        .map_err(|e| BroodError::invalid_run_file(&args.config, &e))?;
    let addr = client::master_addr(args.master.as_deref(), &config);
    work(&config, &addr, stop).map_err(|e| BroodError::explain(&e, &addr))
}

fn work(config: &RunConfig, addr: &str, stop: Arc<AtomicBool>) -> Result<WorkerView, ClientError> {
    let options = client::worker_options();
    let (upstream, id) = client::attach(addr, &config.secret(), &options)?;
    let supervision = Supervision::start(config.heartbeat, Arc::clone(&upstream), id, Arc::clone(&stop))?;

    let breeder = BenchBackend::from_problem(&config.problem);
    let outcome = run_worker(upstream.as_ref(), id, &breeder, &options, &stop);

    // A lost master explains whatever the loop saw afterwards
    if let Some(failure) = supervision.finish() {
        return Err(ClientError::Heartbeat(failure));
    }
    Ok(WorkerView::new(id.0, outcome?))
}
