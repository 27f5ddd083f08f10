// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threaded local backend: pulls whole chunks and executes them on a thread pool
//!
//! Initial chunks are fetched and executed until the master has none left.
//! Optimization ranges are then bred locally from a private pool fragment,
//! which is reconciled with the master after every chunk.

use crate::adapters::{Breeder, FamilyRecord, History, Individual, Population};
use crate::exit;
use crate::id::{ClientId, IndividualId};
use crate::status::JobStatus;
use crate::task::{Lineage, Task};
use crate::upstream::{synchronize_pool, SyncError, TransportError, Upstream};
use crate::worker::nap;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to build worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("upstream returned {got} individuals, asked for {limit}")]
    Overflow { got: usize, limit: usize },
    #[error("master kept answering WAITING after {0} attempts")]
    GaveUp(usize),
    #[error("master reported an unrecoverable state")]
    Snafu,
}

impl From<SyncError> for BackendError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Transport(e) => BackendError::Transport(e),
            SyncError::Overflow { got, limit } => BackendError::Overflow { got, limit },
        }
    }
}

impl BackendError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BackendError::Transport(e) if e.is_connect() => exit::CONNECT_FAILED,
            BackendError::Transport(_) => exit::GET_TASK_FAILED,
            BackendError::ThreadPool(_) => exit::BAD_ARGUMENTS,
            BackendError::Overflow { .. } | BackendError::Snafu => exit::SNAFU,
            BackendError::GaveUp(_) => exit::POLL_FAILED,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThreadedConfig {
    pub threads: usize,
    /// Upper bound on tasks requested per chunk
    pub max_tasks: usize,
    /// Exchange at most this many individuals per sync instead of the whole pool
    pub max_exchange: Option<usize>,
    /// Sleep between chunk requests answered with WAITING
    pub poll_interval: Duration,
    pub max_contact_attempts: usize,
}

impl Default for ThreadedConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_tasks: 100,
            max_exchange: None,
            poll_interval: Duration::from_secs(5),
            max_contact_attempts: 20,
        }
    }
}

/// Counters and timings reported when a run ends
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendStats {
    pub init_chunks: usize,
    pub opt_chunks: usize,
    pub tasks_done: usize,
    #[serde(with = "humantime_serde")]
    pub init_fetch: Duration,
    #[serde(with = "humantime_serde")]
    pub init_work: Duration,
    #[serde(with = "humantime_serde")]
    pub opt_fetch: Duration,
    #[serde(with = "humantime_serde")]
    pub opt_work: Duration,
    #[serde(with = "humantime_serde")]
    pub waited: Duration,
    pub interrupted: bool,
}

impl BackendStats {
    fn log(&self) {
        info!(
            init_chunks = self.init_chunks,
            opt_chunks = self.opt_chunks,
            tasks_done = self.tasks_done,
            init_fetch = %humantime::format_duration(self.init_fetch),
            init_work = %humantime::format_duration(self.init_work),
            opt_fetch = %humantime::format_duration(self.opt_fetch),
            opt_work = %humantime::format_duration(self.opt_work),
            waited = %humantime::format_duration(self.waited),
            "threaded backend done"
        );
    }
}

/// Whole-chunk client backed by a rayon pool
pub struct ThreadedBackend<I> {
    config: ThreadedConfig,
    pool: Box<dyn Population<I>>,
    history: Arc<dyn History>,
    workers: rayon::ThreadPool,
}

impl<I: Individual> ThreadedBackend<I> {
    pub fn new(
        config: ThreadedConfig,
        pool: Box<dyn Population<I>>,
        history: Arc<dyn History>,
    ) -> Result<Self, BackendError> {
        let config = ThreadedConfig {
            threads: config.threads.max(1),
            max_tasks: config.max_tasks.max(1),
            max_contact_attempts: config.max_contact_attempts.max(1),
            ..config
        };
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("brood-worker-{}", i))
            .build()?;
        Ok(Self {
            config,
            pool,
            history,
            workers,
        })
    }

    pub fn config(&self) -> &ThreadedConfig {
        &self.config
    }

    /// The local pool fragment
    pub fn population(&self) -> &dyn Population<I> {
        self.pool.as_ref()
    }

    /// Drive the run to completion, or until `stop` is raised between chunks
    pub fn run(
        &self,
        upstream: &dyn Upstream<I>,
        client: ClientId,
        breeder: &dyn Breeder<I>,
        stop: &AtomicBool,
    ) -> Result<BackendStats, BackendError> {
        let mut stats = BackendStats::default();
        let mut chunk_start = IndividualId(0);

        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(self.interrupted(stats));
            }
            let fetch = Instant::now();
            let tasks = upstream.get_init_chunk(client, self.config.max_tasks)?;
            stats.init_fetch += fetch.elapsed();
            let Some(first) = tasks.iter().map(|t| t.id).min() else {
                break;
            };
            stats.init_chunks += 1;
            chunk_start = first;

            let work = Instant::now();
            self.run_initial(&tasks, client, breeder);
            stats.init_work += work.elapsed();
            stats.tasks_done += tasks.len();
            info!(count = tasks.len(), %chunk_start, "initial chunk executed");

            let fetch = Instant::now();
            synchronize_pool(upstream, client, self.pool.as_ref(), chunk_start, self.config.max_exchange)?;
            stats.init_fetch += fetch.elapsed();
        }

        let mut next = self.sync_and_acquire(upstream, client, chunk_start, &mut stats, stop)?;
        while let Some((start, count)) = next {
            if stop.load(Ordering::SeqCst) {
                return Ok(self.interrupted(stats));
            }
            stats.opt_chunks += 1;
            let work = Instant::now();
            self.run_optimization(start, count, client, breeder);
            stats.opt_work += work.elapsed();
            stats.tasks_done += count;
            info!(%start, count, "optimization chunk executed");

            next = self.sync_and_acquire(upstream, client, start, &mut stats, stop)?;
        }
        if stop.load(Ordering::SeqCst) {
            return Ok(self.interrupted(stats));
        }

        stats.log();
        Ok(stats)
    }

    fn interrupted(&self, mut stats: BackendStats) -> BackendStats {
        warn!(tasks_done = stats.tasks_done, "threaded backend interrupted");
        stats.interrupted = true;
        stats
    }

    fn run_initial(&self, tasks: &[Task<I>], client: ClientId, breeder: &dyn Breeder<I>) {
        let pool = self.pool.as_ref();
        self.workers.install(|| {
            tasks.par_iter().for_each(|task| {
                if let Some(individual) = task.execute(client, breeder).accepted_value() {
                    pool.add_forced(individual);
                }
            })
        });
    }

    fn run_optimization(&self, start: IndividualId, count: usize, client: ClientId, breeder: &dyn Breeder<I>) {
        self.workers.install(|| {
            (0..count)
                .into_par_iter()
                .for_each(|k| self.breed_one(start.offset(k), client, breeder))
        });
    }

    fn breed_one(&self, id: IndividualId, client: ClientId, breeder: &dyn Breeder<I>) {
        let record = match self.pool.parents() {
            Some((mother, father)) => {
                let result = Task::breed(id, mother, father).execute(client, breeder);
                let lineage = result.lineage;
                match result.accepted_value() {
                    Some(individual) => {
                        let accepted = self.pool.add(individual);
                        FamilyRecord::from_lineage(&lineage, accepted, false)
                    }
                    None => FamilyRecord::from_lineage(&lineage, false, true),
                }
            }
            None => FamilyRecord::from_lineage(&Lineage::orphan(id), false, true),
        };
        if let Err(e) = self.history.record_family(record) {
            warn!(child = %record.child, error = %e, "failed to record family");
        }
    }

    /// Sync the pool, then ask for the next range; `None` once the master is done
    fn sync_and_acquire(
        &self,
        upstream: &dyn Upstream<I>,
        client: ClientId,
        chunk_start: IndividualId,
        stats: &mut BackendStats,
        stop: &AtomicBool,
    ) -> Result<Option<(IndividualId, usize)>, BackendError> {
        let fetch = Instant::now();
        let received =
            synchronize_pool(upstream, client, self.pool.as_ref(), chunk_start, self.config.max_exchange)?;
        info!(%chunk_start, received, "pool synchronized");

        for attempt in 1..=self.config.max_contact_attempts {
            let chunk = upstream.get_opt_chunk(client, self.config.max_tasks)?;
            match chunk.status {
                JobStatus::Continue if chunk.count > 0 => {
                    stats.opt_fetch += fetch.elapsed();
                    return Ok(Some((chunk.id_offset, chunk.count)));
                }
                JobStatus::Finish => {
                    stats.opt_fetch += fetch.elapsed();
                    return Ok(None);
                }
                JobStatus::Snafu => return Err(BackendError::Snafu),
                JobStatus::Continue | JobStatus::Waiting => {
                    info!(attempt, "master has no chunk yet, waiting");
                    let wait = Instant::now();
                    nap(self.config.poll_interval, stop);
                    stats.waited += wait.elapsed();
                    if stop.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                }
            }
        }

        error!(attempts = self.config.max_contact_attempts, "giving up on the master");
        Err(BackendError::GaveUp(self.config.max_contact_attempts))
    }
}

#[cfg(test)]
#[path = "threaded_tests.rs"]
mod tests;
