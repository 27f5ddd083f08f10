// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Degenerate job standing in for an unsupported configuration

use super::{ChunkReservation, Job, JobProgress, Phase};
use crate::id::IndividualId;
use crate::status::JobStatus;
use crate::task::{Task, TaskResult};

/// Always finished, never issues work
#[derive(Debug, Clone, Default)]
pub struct NoOpJob {
    reason: Option<String>,
}

impl NoOpJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// A no-op job standing in for an unusable configuration
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl<I> Job<I> for NoOpJob {
    fn next_task(&self) -> Option<Task<I>> {
        None
    }

    fn submit_result(&self, _result: TaskResult<I>) -> JobStatus {
        JobStatus::Finish
    }

    fn next_init_tasks(&self, _max_tasks: usize, _no_proxies: usize) -> Vec<Task<I>> {
        Vec::new()
    }

    fn next_opt_chunk(&self, _max_tasks: usize) -> ChunkReservation {
        ChunkReservation::Exhausted
    }

    fn merge_pools(
        &self,
        _assoc_results: usize,
        _individuals: Vec<I>,
        _max_back: usize,
        _chunk_start: IndividualId,
    ) -> Vec<I> {
        Vec::new()
    }

    fn is_waiting(&self) -> bool {
        false
    }

    fn is_finished(&self) -> bool {
        true
    }

    fn progress(&self) -> JobProgress {
        JobProgress {
            kind: "noop".to_string(),
            phase: Phase::Done,
            init_target: 0,
            init_issued: 0,
            init_returned: 0,
            opt_target: 0,
            opt_issued: 0,
            opt_returned: 0,
        }
    }
}
