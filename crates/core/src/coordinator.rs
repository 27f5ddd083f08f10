// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-agnostic façade binding clients to a job
//!
//! Every operation that names a client stamps its contact time. A return is
//! only applied when the registry shows the client still holds that task;
//! anything else is treated as late or duplicate and answered like a poll.
//! A client asking for a task while holding one gets the same task again.

use crate::adapters::Individual;
use crate::clock::Clock;
use crate::id::{ClientId, IndividualId};
use crate::job::{AnyJob, ChunkReservation, Job, JobProgress};
use crate::registry::{ClientRegistry, OutstandingWork};
use crate::status::JobStatus;
use crate::task::{Task, TaskResult};
use crate::upstream::{OptChunk, Registration, TransportError, Upstream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown client {0}")]
    UnknownClient(ClientId),
    #[error("coordinator is not healthy: {0}")]
    Unhealthy(String),
}

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSummary {
    pub progress: JobProgress,
    pub status: JobStatus,
    pub healthy: bool,
    pub registered: usize,
    pub active_contacts: usize,
    pub outstanding_clients: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub dummies: usize,
    pub evicted: Vec<ClientId>,
    pub stale: Vec<ClientId>,
}

pub struct Coordinator<I, C: Clock> {
    job: AnyJob<I>,
    registry: ClientRegistry<I, C>,
    no_proxies: usize,
    unhealthy: Option<String>,
}

impl<I: Individual, C: Clock> Coordinator<I, C> {
    pub fn new(job: AnyJob<I>, registry: ClientRegistry<I, C>, no_proxies: usize) -> Self {
        let reason = match &job {
            AnyJob::NoOp(noop) => noop.reason().map(str::to_string),
            _ => None,
        };
        if let Some(reason) = &reason {
            warn!(reason = %reason, "coordinator starts unhealthy");
        }
        Self {
            job,
            registry,
            no_proxies: no_proxies.max(1),
            unhealthy: reason,
        }
    }

    pub fn job(&self) -> &AnyJob<I> {
        &self.job
    }

    pub fn registry(&self) -> &ClientRegistry<I, C> {
        &self.registry
    }

    pub fn is_healthy(&self) -> bool {
        self.unhealthy.is_none() && self.job.failure().is_none()
    }

    fn unhealthy_reason(&self) -> String {
        self.job
            .failure()
            .or_else(|| self.unhealthy.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn ensure_known(&self, client: ClientId) -> Result<(), CoordinatorError> {
        if self.registry.is_known(client) {
            Ok(())
        } else {
            warn!(%client, "call from unknown client rejected");
            Err(CoordinatorError::UnknownClient(client))
        }
    }

    pub fn register(&self, key: &str) -> Result<Registration, CoordinatorError> {
        if !self.is_healthy() {
            return Err(CoordinatorError::Unhealthy(self.unhealthy_reason()));
        }
        Ok(self.registry.register(key))
    }

    pub fn get_task(&self, client: ClientId) -> Result<Option<Task<I>>, CoordinatorError> {
        self.ensure_known(client)?;
        // A client asking again without returning lost our answer
        if let Some(task) = self.registry.held_task(client) {
            debug!(%client, task = %task.id, "task re-sent");
            return Ok(Some(task));
        }
        match self.job.next_task() {
            Some(task) => {
                debug!(%client, task = %task.id, "task issued");
                self.registry.record_issue(client, OutstandingWork::Task(task.clone()));
                Ok(Some(task))
            }
            None => {
                self.registry.ping(client);
                Ok(None)
            }
        }
    }

    pub fn return_result(&self, client: ClientId, result: TaskResult<I>) -> Result<JobStatus, CoordinatorError> {
        self.ensure_known(client)?;
        if !self.registry.take_task(client, result.lineage.child) {
            warn!(
                %client,
                child = %result.lineage.child,
                "result without outstanding task rejected"
            );
            return Ok(self.what_next(client));
        }
        let status = self.job.submit_result(result);
        if status == JobStatus::Finish {
            self.registry.retire(client);
        }
        Ok(status)
    }

    /// Apply a result without the outstanding check; used for injected dummies
    pub fn return_result_forced(&self, result: TaskResult<I>) -> JobStatus {
        self.job.submit_result(result)
    }

    pub fn poll(&self, client: ClientId) -> Result<JobStatus, CoordinatorError> {
        self.ensure_known(client)?;
        Ok(self.what_next(client))
    }

    fn what_next(&self, client: ClientId) -> JobStatus {
        self.registry.ping(client);
        if self.job.failure().is_some() {
            JobStatus::Snafu
        } else if self.job.is_finished() {
            self.registry.retire(client);
            JobStatus::Finish
        } else if self.job.is_waiting() {
            JobStatus::Waiting
        } else {
            JobStatus::Continue
        }
    }

    pub fn is_alive(&self, client: ClientId) -> Result<bool, CoordinatorError> {
        self.ensure_known(client)?;
        self.registry.ping(client);
        Ok(self.is_healthy())
    }

    pub fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<I>>, CoordinatorError> {
        self.ensure_known(client)?;
        if self.job.is_waiting() || self.job.is_finished() {
            self.registry.ping(client);
            return Ok(Vec::new());
        }

        let tasks = self.job.next_init_tasks(max_tasks, self.no_proxies);
        if tasks.is_empty() {
            self.registry.ping(client);
        }
        for task in &tasks {
            self.registry.record_issue(client, OutstandingWork::Task(task.clone()));
        }
        if !tasks.is_empty() {
            info!(%client, count = tasks.len(), "initial chunk issued");
        }
        Ok(tasks)
    }

    pub fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, CoordinatorError> {
        self.ensure_known(client)?;
        self.registry.ping(client);

        if self.job.is_finished() {
            self.registry.retire(client);
            return Ok(OptChunk::status(JobStatus::Finish));
        }

        let chunk = match self.job.next_opt_chunk(max_tasks) {
            ChunkReservation::Granted { id_offset, count } => {
                self.registry.record_issue(
                    client,
                    OutstandingWork::Range {
                        first: id_offset,
                        count,
                    },
                );
                info!(%client, %id_offset, count, "optimization chunk issued");
                OptChunk {
                    status: JobStatus::Continue,
                    id_offset,
                    count,
                }
            }
            ChunkReservation::NotReady => OptChunk::status(JobStatus::Waiting),
            ChunkReservation::Exhausted => {
                if self.job.is_finished() {
                    self.registry.retire(client);
                    OptChunk::status(JobStatus::Finish)
                } else {
                    OptChunk::status(JobStatus::Waiting)
                }
            }
        };
        Ok(chunk)
    }

    pub fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<I>, CoordinatorError> {
        self.ensure_known(client)?;
        match self.registry.take_outstanding(client) {
            Some(assoc) => Ok(self.job.merge_pools(assoc, individuals, max_back, chunk_start)),
            None => {
                warn!(
                    %client,
                    discarded = individuals.len(),
                    "sync without outstanding work, discarding individuals"
                );
                Ok(self.job.merge_pools(0, Vec::new(), max_back, chunk_start))
            }
        }
    }

    /// Job finished and no client heard from within the contact timeout
    pub fn is_everything_done(&self) -> bool {
        self.job.is_finished() && self.registry.all_quiesced()
    }

    /// Evict timed-out work into the job and drop stale contacts
    pub fn sweep(&self) -> SweepSummary {
        let report = self.registry.sweep();
        let dummies = report.dummies.len();
        for dummy in report.dummies {
            self.return_result_forced(dummy);
        }
        if dummies > 0 {
            info!(dummies, evicted = report.evicted.len(), "forced dummy results");
        }
        SweepSummary {
            dummies,
            evicted: report.evicted,
            stale: report.stale,
        }
    }

    pub fn summary(&self) -> CoordinatorSummary {
        CoordinatorSummary {
            progress: self.job.progress(),
            status: self.job.status(),
            healthy: self.is_healthy(),
            registered: self.registry.registered(),
            active_contacts: self.registry.active_contacts(),
            outstanding_clients: self.registry.outstanding_clients(),
            failure: self.job.failure(),
        }
    }
}

fn rejected(e: CoordinatorError) -> TransportError {
    TransportError::Rejected(e.to_string())
}

impl<I: Individual, C: Clock> Upstream<I> for Coordinator<I, C> {
    fn register(&self, key: &str) -> Result<Registration, TransportError> {
        Coordinator::register(self, key).map_err(rejected)
    }

    fn get_task(&self, client: ClientId) -> Result<Option<Task<I>>, TransportError> {
        Coordinator::get_task(self, client).map_err(rejected)
    }

    fn return_result(&self, client: ClientId, result: TaskResult<I>) -> Result<JobStatus, TransportError> {
        Coordinator::return_result(self, client, result).map_err(rejected)
    }

    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError> {
        Coordinator::poll(self, client).map_err(rejected)
    }

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError> {
        Coordinator::is_alive(self, client).map_err(rejected)
    }

    fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<I>>, TransportError> {
        Coordinator::get_init_chunk(self, client, max_tasks).map_err(rejected)
    }

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError> {
        Coordinator::get_opt_chunk(self, client, max_tasks).map_err(rejected)
    }

    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<I>, TransportError> {
        Coordinator::sync_pool(self, client, individuals, max_back, chunk_start).map_err(rejected)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
