// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machines
//!
//! A job tracks two counted phases: filling the pool with an initial
//! generation, then a fixed number of breeding steps. Variants are a closed
//! set selected by [`JobKind`] at construction and dispatched through [`AnyJob`].

mod master;
mod noop;
mod proxy;

pub use master::{MasterJob, MasterSettings};
pub use noop::NoOpJob;
pub use proxy::{ProxyJob, ProxySettings};

use crate::adapters::{History, Individual, Population, SnapshotWriter};
use crate::id::IndividualId;
use crate::status::JobStatus;
use crate::task::{Task, TaskResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a job stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitIssuing,
    InitDraining,
    OptIssuing,
    OptDraining,
    Done,
}

impl Phase {
    pub fn is_init(self) -> bool {
        matches!(self, Phase::InitIssuing | Phase::InitDraining)
    }

    pub fn is_draining(self) -> bool {
        matches!(self, Phase::InitDraining | Phase::OptDraining)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::InitIssuing => "init-issuing",
            Phase::InitDraining => "init-draining",
            Phase::OptIssuing => "opt-issuing",
            Phase::OptDraining => "opt-draining",
            Phase::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Answer to a chunk reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReservation {
    /// IDs `id_offset .. id_offset + count` now belong to the caller
    Granted { id_offset: IndividualId, count: usize },
    /// The optimization phase has not opened yet
    NotReady,
    /// Every optimization step has been handed out
    Exhausted,
}

/// Counters for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub kind: String,
    pub phase: Phase,
    pub init_target: usize,
    pub init_issued: usize,
    pub init_returned: usize,
    pub opt_target: usize,
    pub opt_issued: usize,
    pub opt_returned: usize,
}

/// Job type requested by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobKind {
    Master,
    Proxy,
    NoOp,
    Unsupported(String),
}

impl JobKind {
    pub fn is_supported(&self) -> bool {
        !matches!(self, JobKind::Unsupported(_))
    }
}

impl From<String> for JobKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "master" => JobKind::Master,
            "proxy" => JobKind::Proxy,
            "noop" => JobKind::NoOp,
            _ => JobKind::Unsupported(s),
        }
    }
}

impl From<JobKind> for String {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Master => "master".to_string(),
            JobKind::Proxy => "proxy".to_string(),
            JobKind::NoOp => "noop".to_string(),
            JobKind::Unsupported(s) => s,
        }
    }
}

/// Collaborators a job mutates
pub struct JobDeps<I> {
    pub pool: Box<dyn Population<I>>,
    pub history: Arc<dyn History>,
    pub snapshots: Arc<dyn SnapshotWriter<I>>,
}

/// The interface every job variant implements
pub trait Job<I>: Send + Sync {
    /// Next task to hand to a single-task client; `None` while draining or done
    fn next_task(&self) -> Option<Task<I>>;

    /// Apply one result and report what the submitting client should do next
    fn submit_result(&self, result: TaskResult<I>) -> JobStatus;

    /// Up to `min(max_tasks, ceil(pool_size / no_proxies))` initial tasks
    fn next_init_tasks(&self, max_tasks: usize, no_proxies: usize) -> Vec<Task<I>>;

    /// Reserve a contiguous range of optimization IDs in one step
    fn next_opt_chunk(&self, max_tasks: usize) -> ChunkReservation;

    /// Merge a client's individuals into the pool and return the best `max_back`.
    /// Advances the current phase's return counter by `assoc_results`.
    fn merge_pools(
        &self,
        assoc_results: usize,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Vec<I>;

    fn is_waiting(&self) -> bool;

    fn is_finished(&self) -> bool;

    fn status(&self) -> JobStatus {
        let finished = self.is_finished();
        let waiting = self.is_waiting();
        JobStatus::from_flags(waiting, finished)
    }

    fn progress(&self) -> JobProgress;

    /// Why the job can no longer make progress, if it broke
    fn failure(&self) -> Option<String> {
        None
    }
}

/// Closed set of job variants
pub enum AnyJob<I> {
    Master(MasterJob<I>),
    Proxy(ProxyJob<I>),
    NoOp(NoOpJob),
}

impl<I> AnyJob<I> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnyJob::Master(_) => "master",
            AnyJob::Proxy(_) => "proxy",
            AnyJob::NoOp(_) => "noop",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $job:ident => $body:expr) => {
        match $self {
            AnyJob::Master($job) => $body,
            AnyJob::Proxy($job) => $body,
            AnyJob::NoOp($job) => $body,
        }
    };
}

impl<I: Individual> Job<I> for AnyJob<I> {
    fn next_task(&self) -> Option<Task<I>> {
        dispatch!(self, job => Job::<I>::next_task(job))
    }

    fn submit_result(&self, result: TaskResult<I>) -> JobStatus {
        dispatch!(self, job => Job::<I>::submit_result(job, result))
    }

    fn next_init_tasks(&self, max_tasks: usize, no_proxies: usize) -> Vec<Task<I>> {
        dispatch!(self, job => Job::<I>::next_init_tasks(job, max_tasks, no_proxies))
    }

    fn next_opt_chunk(&self, max_tasks: usize) -> ChunkReservation {
        dispatch!(self, job => Job::<I>::next_opt_chunk(job, max_tasks))
    }

    fn merge_pools(
        &self,
        assoc_results: usize,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Vec<I> {
        dispatch!(self, job => Job::<I>::merge_pools(job, assoc_results, individuals, max_back, chunk_start))
    }

    fn is_waiting(&self) -> bool {
        dispatch!(self, job => Job::<I>::is_waiting(job))
    }

    fn is_finished(&self) -> bool {
        dispatch!(self, job => Job::<I>::is_finished(job))
    }

    fn status(&self) -> JobStatus {
        dispatch!(self, job => Job::<I>::status(job))
    }

    fn progress(&self) -> JobProgress {
        dispatch!(self, job => Job::<I>::progress(job))
    }

    fn failure(&self) -> Option<String> {
        dispatch!(self, job => Job::<I>::failure(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        master = { "master", JobKind::Master },
        proxy = { "proxy", JobKind::Proxy },
        noop = { "noop", JobKind::NoOp },
        unknown = { "switch", JobKind::Unsupported("switch".to_string()) },
    )]
    fn job_kind_parses(input: &str, expected: JobKind) {
        assert_eq!(JobKind::from(input.to_string()), expected);
    }

    #[test]
    fn only_unknown_kinds_are_unsupported() {
        assert!(JobKind::Master.is_supported());
        assert!(!JobKind::Unsupported("x".to_string()).is_supported());
    }

    #[test]
    fn draining_phases() {
        assert!(Phase::InitDraining.is_draining());
        assert!(Phase::OptDraining.is_draining());
        assert!(!Phase::OptIssuing.is_draining());
        assert!(Phase::InitIssuing.is_init());
        assert!(!Phase::Done.is_init());
    }
}
