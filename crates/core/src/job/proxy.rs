// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy job: re-chunks an upstream master's work for local clients
//!
//! The proxy fetches initial tasks and optimization ranges from its upstream,
//! hands them out one at a time, and synchronizes its local pool fragment
//! with the upstream whenever a batch completes. Upstream calls are made
//! while holding the state write lock, so at most one is in flight.

use super::{ChunkReservation, Job, JobProgress, Phase};
use crate::adapters::{FamilyRecord, History, Individual, Population};
use crate::heartbeat::Heartbeat;
use crate::id::{ClientId, IndividualId};
use crate::status::JobStatus;
use crate::task::{Lineage, Task, TaskResult};
use crate::upstream::{synchronize_pool, Upstream};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ProxySettings {
    /// ID the upstream assigned to this proxy
    pub client: ClientId,
    pub max_tasks: usize,
    /// Exchange at most this many individuals per sync instead of the whole pool
    pub max_exchange: Option<usize>,
}

struct ProxyState<I> {
    init_queue: VecDeque<Task<I>>,
    init_fetched: bool,
    init_gotten: usize,
    init_handed: usize,
    init_returned: usize,
    init_complete: bool,
    chunk_start: IndividualId,
    chunk_count: usize,
    handed: usize,
    returned: usize,
    opt_complete: bool,
    last_upstream: JobStatus,
    broken: Option<String>,
}

impl<I> ProxyState<I> {
    fn new() -> Self {
        Self {
            init_queue: VecDeque::new(),
            init_fetched: false,
            init_gotten: 0,
            init_handed: 0,
            init_returned: 0,
            init_complete: false,
            chunk_start: IndividualId(0),
            chunk_count: 0,
            handed: 0,
            returned: 0,
            opt_complete: false,
            last_upstream: JobStatus::Continue,
            broken: None,
        }
    }

    fn phase(&self) -> Phase {
        if self.broken.is_some() || (self.init_complete && self.opt_complete) {
            Phase::Done
        } else if !self.init_complete {
            if !self.init_fetched || !self.init_queue.is_empty() {
                Phase::InitIssuing
            } else {
                Phase::InitDraining
            }
        } else if self.handed < self.chunk_count {
            Phase::OptIssuing
        } else {
            Phase::OptDraining
        }
    }

    /// Local clients hold work that has not come back yet
    fn waiting(&self) -> bool {
        if self.broken.is_some() {
            return false;
        }
        let init_waiting = !self.init_complete
            && self.init_fetched
            && self.init_queue.is_empty()
            && self.init_returned < self.init_gotten;
        let opt_waiting = self.init_complete
            && !self.opt_complete
            && self.handed >= self.chunk_count
            && self.returned < self.chunk_count;
        init_waiting || opt_waiting
    }
}

pub struct ProxyJob<I> {
    settings: ProxySettings,
    upstream: Arc<dyn Upstream<I>>,
    state: RwLock<ProxyState<I>>,
    pool: RwLock<Box<dyn Population<I>>>,
    history: Arc<dyn History>,
    heartbeat: Option<Heartbeat>,
}

impl<I: Individual> ProxyJob<I> {
    pub fn new(
        settings: ProxySettings,
        upstream: Arc<dyn Upstream<I>>,
        pool: Box<dyn Population<I>>,
        history: Arc<dyn History>,
    ) -> Self {
        Self {
            settings: ProxySettings {
                max_tasks: settings.max_tasks.max(1),
                ..settings
            },
            upstream,
            state: RwLock::new(ProxyState::new()),
            pool: RwLock::new(pool),
            history,
            heartbeat: None,
        }
    }

    /// Stop `heartbeat` once the proxy finishes or breaks
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn is_broken(&self) -> bool {
        self.state_read().broken.is_some()
    }

    fn state_read(&self) -> RwLockReadGuard<'_, ProxyState<I>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn state_write(&self) -> RwLockWriteGuard<'_, ProxyState<I>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn with_pool<R>(&self, f: impl FnOnce(&dyn Population<I>) -> R) -> R {
        let pool = self.pool.read().unwrap_or_else(|e| e.into_inner());
        f(pool.as_ref())
    }

    fn with_pool_write<R>(&self, f: impl FnOnce(&dyn Population<I>) -> R) -> R {
        let pool = self.pool.write().unwrap_or_else(|e| e.into_inner());
        f(pool.as_ref())
    }

    fn record(&self, record: FamilyRecord) {
        if let Err(e) = self.history.record_family(record) {
            warn!(child = %record.child, error = %e, "failed to record family");
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
        }
    }

    fn break_locked(&self, state: &mut ProxyState<I>, reason: String) {
        error!(reason = %reason, "proxy lost its upstream");
        state.broken = Some(reason);
        state.last_upstream = JobStatus::Snafu;
        self.stop_heartbeat();
    }

    /// Fetch more initial tasks; returns how many arrived
    fn fetch_init_locked(&self, state: &mut ProxyState<I>) -> usize {
        match self
            .upstream
            .get_init_chunk(self.settings.client, self.settings.max_tasks)
        {
            Ok(tasks) => {
                state.init_fetched = true;
                state.init_gotten += tasks.len();
                let n = tasks.len();
                state.init_queue.extend(tasks);
                info!(fetched = n, total = state.init_gotten, "initial tasks fetched");
                n
            }
            Err(e) => {
                self.break_locked(state, format!("fetching initial tasks: {}", e));
                0
            }
        }
    }

    fn complete_init_locked(&self, state: &mut ProxyState<I>) -> JobStatus {
        state.init_complete = true;
        info!(returned = state.init_returned, "local initial generation complete");
        self.sync_locked(state);
        if state.broken.is_some() {
            return JobStatus::Snafu;
        }
        self.request_chunk_locked(state)
    }

    /// Reconcile the local pool with the upstream's
    fn sync_locked(&self, state: &mut ProxyState<I>) {
        let start = state.chunk_start;
        let outcome = self.with_pool_write(|pool| {
            synchronize_pool(
                self.upstream.as_ref(),
                self.settings.client,
                pool,
                start,
                self.settings.max_exchange,
            )
        });

        match outcome {
            Ok(received) => info!(%start, received, "pool synchronized"),
            Err(e) => self.break_locked(state, format!("syncing pool: {}", e)),
        }
    }

    /// Ask the upstream for the next optimization range
    fn request_chunk_locked(&self, state: &mut ProxyState<I>) -> JobStatus {
        let chunk = match self
            .upstream
            .get_opt_chunk(self.settings.client, self.settings.max_tasks)
        {
            Ok(chunk) => chunk,
            Err(e) => {
                self.break_locked(state, format!("requesting chunk: {}", e));
                return JobStatus::Snafu;
            }
        };

        match chunk.status {
            JobStatus::Continue if chunk.count > 0 => {
                info!(id_offset = %chunk.id_offset, count = chunk.count, "chunk granted");
                state.chunk_start = chunk.id_offset;
                state.chunk_count = chunk.count;
                state.handed = 0;
                state.returned = 0;
                state.last_upstream = JobStatus::Continue;
            }
            JobStatus::Continue | JobStatus::Waiting => {
                info!("upstream has no chunk yet");
                state.last_upstream = JobStatus::Waiting;
            }
            JobStatus::Finish => {
                info!("upstream has no more chunks");
                state.opt_complete = true;
                state.last_upstream = JobStatus::Finish;
            }
            JobStatus::Snafu => {
                self.break_locked(state, "upstream answered SNAFU to a chunk request".to_string());
            }
        }
        state.last_upstream
    }

    /// Count one optimization slot as done; sync and move on once the chunk is
    fn opt_returned_locked(&self, state: &mut ProxyState<I>) -> Option<JobStatus> {
        state.returned = (state.returned + 1).min(state.handed);
        if state.chunk_count == 0 || state.returned < state.chunk_count {
            return None;
        }
        info!(chunk_start = %state.chunk_start, count = state.chunk_count, "chunk complete");
        self.sync_locked(state);
        if state.broken.is_some() {
            return Some(JobStatus::Snafu);
        }
        Some(self.request_chunk_locked(state))
    }

    fn issue_breed_locked(&self, state: &mut ProxyState<I>) -> Option<Task<I>> {
        let id = state.chunk_start.offset(state.handed);
        state.handed += 1;
        match self.with_pool(|pool| pool.parents()) {
            Some((mother, father)) => Some(Task::breed(id, mother, father)),
            None => {
                warn!(%id, "local pool is empty, counting optimization step as failed");
                self.record(FamilyRecord::from_lineage(&Lineage::orphan(id), false, true));
                self.opt_returned_locked(state);
                None
            }
        }
    }
}

impl<I: Individual> Job<I> for ProxyJob<I> {
    fn next_task(&self) -> Option<Task<I>> {
        let mut state = self.state_write();

        if !state.init_complete && !state.init_fetched {
            let fetched = self.fetch_init_locked(&mut state);
            if fetched == 0 && state.broken.is_none() {
                self.complete_init_locked(&mut state);
            }
        }
        if state.broken.is_some() {
            return None;
        }

        if !state.init_complete {
            let task = state.init_queue.pop_front();
            if task.is_some() {
                state.init_handed += 1;
            }
            return task;
        }

        if state.opt_complete {
            return None;
        }
        if state.handed >= state.chunk_count {
            // Told to wait earlier and nothing left outstanding to trigger a new request
            if state.returned >= state.chunk_count && state.last_upstream == JobStatus::Waiting {
                self.request_chunk_locked(&mut state);
            }
            if state.opt_complete || state.broken.is_some() || state.handed >= state.chunk_count {
                return None;
            }
        }
        self.issue_breed_locked(&mut state)
    }

    fn submit_result(&self, result: TaskResult<I>) -> JobStatus {
        let init = {
            let state = self.state_read();
            if state.broken.is_some() {
                return JobStatus::Snafu;
            }
            !state.init_complete
        };
        let lineage = result.lineage;

        let answer = if init {
            if let Some(individual) = result.accepted_value() {
                self.with_pool(|pool| pool.add_forced(individual));
            }

            let mut state = self.state_write();
            state.init_returned = (state.init_returned + 1).min(state.init_handed);
            if !state.init_complete && state.init_queue.is_empty() && state.init_returned == state.init_gotten {
                if self.fetch_init_locked(&mut state) > 0 {
                    state.last_upstream = JobStatus::Continue;
                    Some(JobStatus::Continue)
                } else if state.broken.is_some() {
                    Some(JobStatus::Snafu)
                } else {
                    Some(self.complete_init_locked(&mut state))
                }
            } else {
                None
            }
        } else {
            let record = match result.accepted_value() {
                Some(individual) => {
                    let accepted = self.with_pool(|pool| pool.add(individual));
                    FamilyRecord::from_lineage(&lineage, accepted, false)
                }
                None => FamilyRecord::from_lineage(&lineage, false, true),
            };
            self.record(record);

            let mut state = self.state_write();
            self.opt_returned_locked(&mut state)
        };

        match answer {
            Some(JobStatus::Waiting) => JobStatus::Waiting,
            Some(JobStatus::Snafu) => JobStatus::Snafu,
            _ => self.status(),
        }
    }

    fn next_init_tasks(&self, _max_tasks: usize, _no_proxies: usize) -> Vec<Task<I>> {
        error!("initial chunk requested from a proxy; proxies cannot be chained");
        Vec::new()
    }

    fn next_opt_chunk(&self, _max_tasks: usize) -> ChunkReservation {
        error!("optimization chunk requested from a proxy; proxies cannot be chained");
        ChunkReservation::Exhausted
    }

    fn merge_pools(
        &self,
        _assoc_results: usize,
        _individuals: Vec<I>,
        _max_back: usize,
        _chunk_start: IndividualId,
    ) -> Vec<I> {
        error!("pool sync requested from a proxy; proxies cannot be chained");
        Vec::new()
    }

    fn is_waiting(&self) -> bool {
        self.state_read().waiting()
    }

    fn is_finished(&self) -> bool {
        let finished = {
            let state = self.state_read();
            state.broken.is_none() && state.init_complete && state.opt_complete
        };
        if finished {
            self.stop_heartbeat();
        }
        finished
    }

    fn status(&self) -> JobStatus {
        if self.is_broken() {
            return JobStatus::Snafu;
        }
        let finished = self.is_finished();
        let waiting = self.is_waiting();
        JobStatus::from_flags(waiting, finished)
    }

    fn progress(&self) -> JobProgress {
        let state = self.state_read();
        JobProgress {
            kind: "proxy".to_string(),
            phase: state.phase(),
            init_target: state.init_gotten,
            init_issued: state.init_handed,
            init_returned: state.init_returned,
            opt_target: state.chunk_count,
            opt_issued: state.handed,
            opt_returned: state.returned,
        }
    }

    fn failure(&self) -> Option<String> {
        self.state_read().broken.clone()
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
