// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;
use std::path::PathBuf;

use brood_core::{BackendStats, CoordinatorSummary, JobKind, RunConfig, WorkerReport};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Master status as reported by `brood status`
#[derive(Serialize)]
#[serde(transparent)]
pub struct StatusView(pub CoordinatorSummary);

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        let p = &s.progress;
        writeln!(f, "Job: {} ({})", p.kind, p.phase)?;
        writeln!(f, "  Status: {}", s.status)?;
        writeln!(f, "  Healthy: {}", if s.healthy { "yes" } else { "no" })?;
        writeln!(
            f,
            "  Init: {}/{} returned, {} issued",
            p.init_returned, p.init_target, p.init_issued
        )?;
        writeln!(
            f,
            "  Optimization: {}/{} returned, {} issued",
            p.opt_returned, p.opt_target, p.opt_issued
        )?;
        write!(
            f,
            "  Clients: {} registered, {} active, {} with outstanding work",
            s.registered, s.active_contacts, s.outstanding_clients
        )?;
        if let Some(failure) = &s.failure {
            write!(f, "\n  Failure: {}", failure)?;
        }
        Ok(())
    }
}

/// End-of-run report for `brood worker`
#[derive(Serialize)]
pub struct WorkerView {
    pub client: i64,
    pub tasks_done: usize,
    pub interrupted: bool,
}

impl WorkerView {
    pub fn new(client: i64, report: WorkerReport) -> Self {
        Self {
            client,
            tasks_done: report.tasks_done,
            interrupted: report.interrupted,
        }
    }
}

impl fmt::Display for WorkerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = if self.interrupted { "interrupted" } else { "finished" };
        write!(f, "Client {} {} after {} tasks", self.client, how, self.tasks_done)
    }
}

/// End-of-run report for `brood threader`
#[derive(Serialize)]
#[serde(transparent)]
pub struct StatsView(pub BackendStats);

impl fmt::Display for StatsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        let how = if s.interrupted { "Interrupted" } else { "Finished" };
        writeln!(
            f,
            "{} after {} tasks ({} init chunks, {} optimization chunks)",
            how, s.tasks_done, s.init_chunks, s.opt_chunks
        )?;
        writeln!(f, "  Init: fetch {:.2?}, work {:.2?}", s.init_fetch, s.init_work)?;
        writeln!(f, "  Optimization: fetch {:.2?}, work {:.2?}", s.opt_fetch, s.opt_work)?;
        write!(f, "  Waited: {:.2?}", s.waited)
    }
}

/// What `brood check-config` found in a run file
#[derive(Serialize)]
pub struct ConfigView {
    pub path: PathBuf,
    pub kind: JobKind,
    pub pool_size: usize,
    pub glob_opt_iterations: usize,
    pub max_tasks_per_chunk: usize,
    pub listen: String,
    pub upstream: Option<String>,
    pub output: PathBuf,
}

impl ConfigView {
    pub fn new(path: PathBuf, config: &RunConfig) -> Self {
        Self {
            path,
            kind: config.job.kind.clone(),
            pool_size: config.job.pool_size,
            glob_opt_iterations: config.job.glob_opt_iterations,
            max_tasks_per_chunk: config.chunks.max_tasks_per_chunk,
            listen: config.network.listen.clone(),
            upstream: config.network.upstream.clone(),
            output: config.output.dir.clone(),
        }
    }
}

impl fmt::Display for ConfigView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: ok", self.path.display())?;
        let kind = String::from(self.kind.clone());
        if self.kind.is_supported() {
            writeln!(f, "  Kind: {}", kind)?;
        } else {
            writeln!(f, "  Kind: {} (unsupported, broodd will refuse to run it)", kind)?;
        }
        writeln!(
            f,
            "  Pool: {} individuals, {} optimization steps",
            self.pool_size, self.glob_opt_iterations
        )?;
        writeln!(f, "  Chunks: up to {} tasks", self.max_tasks_per_chunk)?;
        match &self.upstream {
            Some(upstream) => writeln!(f, "  Listen: {} (upstream {})", self.listen, upstream)?,
            None => writeln!(f, "  Listen: {}", self.listen)?,
        }
        write!(f, "  Output: {}", self.output.display())
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
