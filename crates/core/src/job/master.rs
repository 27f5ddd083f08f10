// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master job: the authoritative pool and the two counted phases
//!
//! Two locks guard the job. The state lock covers counters and flags; the
//! pool lock serializes read-then-write sequences on the population. A
//! thread holding both always took the state lock first.

use super::{ChunkReservation, Job, JobDeps, JobProgress, Phase};
use crate::adapters::{FamilyRecord, History, Individual, Population, SnapshotWriter};
use crate::id::IndividualId;
use crate::status::JobStatus;
use crate::task::{Lineage, SeedSource, Task, TaskResult};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct MasterSettings {
    pub pool_size: usize,
    pub glob_opt_iterations: usize,
}

struct MasterState {
    pool_size: usize,
    opt_target: usize,
    init_issued: usize,
    init_returned: usize,
    opt_issued: usize,
    opt_returned: usize,
    // Handed out last-first
    seeds: Vec<SeedSource>,
    fitness_reached: bool,
    initial_written: bool,
    results_written: bool,
}

impl MasterState {
    fn phase(&self) -> Phase {
        if self.fitness_reached {
            Phase::Done
        } else if self.init_returned < self.pool_size {
            if self.init_issued < self.pool_size {
                Phase::InitIssuing
            } else {
                Phase::InitDraining
            }
        } else if self.opt_returned < self.opt_target {
            if self.opt_issued < self.opt_target {
                Phase::OptIssuing
            } else {
                Phase::OptDraining
            }
        } else {
            Phase::Done
        }
    }
}

pub struct MasterJob<I> {
    template: I,
    state: RwLock<MasterState>,
    pool: RwLock<Box<dyn Population<I>>>,
    history: Arc<dyn History>,
    snapshots: Arc<dyn SnapshotWriter<I>>,
}

impl<I: Individual> MasterJob<I> {
    pub fn new(settings: MasterSettings, template: I, seeds: Vec<SeedSource>, deps: JobDeps<I>) -> Self {
        let pool_size = settings.pool_size.max(1);
        if seeds.len() > pool_size {
            warn!(
                seeds = seeds.len(),
                pool_size, "more seed files than pool slots, extra seeds are ignored"
            );
        }
        Self {
            template,
            state: RwLock::new(MasterState {
                pool_size,
                opt_target: settings.glob_opt_iterations,
                init_issued: 0,
                init_returned: 0,
                opt_issued: 0,
                opt_returned: 0,
                seeds,
                fitness_reached: false,
                initial_written: false,
                results_written: false,
            }),
            pool: RwLock::new(deps.pool),
            history: deps.history,
            snapshots: deps.snapshots,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state_read().phase()
    }

    fn state_read(&self) -> RwLockReadGuard<'_, MasterState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn state_write(&self) -> RwLockWriteGuard<'_, MasterState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Single operations on the internally synchronized population
    fn with_pool<R>(&self, f: impl FnOnce(&dyn Population<I>) -> R) -> R {
        let pool = self.pool.read().unwrap_or_else(|e| e.into_inner());
        f(pool.as_ref())
    }

    /// Sequences that must not interleave with other pool mutation
    fn with_pool_write<R>(&self, f: impl FnOnce(&dyn Population<I>) -> R) -> R {
        let pool = self.pool.write().unwrap_or_else(|e| e.into_inner());
        f(pool.as_ref())
    }

    fn record(&self, record: FamilyRecord) {
        if let Err(e) = self.history.record_family(record) {
            warn!(child = %record.child, error = %e, "failed to record family");
        }
    }

    fn issue_locked(&self, state: &mut MasterState) -> Option<Task<I>> {
        match state.phase() {
            Phase::InitIssuing => {
                let id = IndividualId(state.init_issued as u64);
                state.init_issued += 1;
                let task = match state.seeds.pop() {
                    Some(source) => Task::seed(id, self.template.clone(), source),
                    None => Task::init(id, self.template.clone()),
                };
                if state.init_issued == state.pool_size {
                    info!(issued = state.init_issued, "all initial tasks issued");
                }
                Some(task)
            }
            Phase::OptIssuing => {
                let id = IndividualId((state.pool_size + state.opt_issued) as u64);
                state.opt_issued += 1;
                if state.opt_issued == state.opt_target {
                    info!(issued = state.opt_issued, "all optimization tasks issued");
                }
                match self.with_pool(|pool| pool.parents()) {
                    Some((mother, father)) => Some(Task::breed(id, mother, father)),
                    None => {
                        // Nothing to breed from; the slot is consumed as a failed attempt.
                        warn!(%id, "pool is empty, counting optimization step as failed");
                        self.record(FamilyRecord::from_lineage(&Lineage::orphan(id), false, true));
                        self.advance_locked(state, false, 1);
                        None
                    }
                }
            }
            Phase::InitDraining | Phase::OptDraining => None,
            Phase::Done => {
                error!(
                    init_issued = state.init_issued,
                    init_returned = state.init_returned,
                    opt_issued = state.opt_issued,
                    opt_returned = state.opt_returned,
                    "task requested from a finished job"
                );
                None
            }
        }
    }

    /// Advance the return counter of one phase and fire snapshot side effects
    fn advance_locked(&self, state: &mut MasterState, init: bool, n: usize) {
        if n == 0 {
            return;
        }
        if init {
            state.init_returned = (state.init_returned + n).min(state.init_issued);
            if state.init_returned == state.pool_size && !state.initial_written {
                state.initial_written = true;
                info!(returned = state.init_returned, "initial generation complete");
                let ranked = self.with_pool(|pool| pool.ranked(usize::MAX));
                if let Err(e) = self.snapshots.write_initial(&ranked) {
                    warn!(error = %e, "failed to write initial snapshot");
                }
            }
        } else {
            state.opt_returned = (state.opt_returned + n).min(state.opt_issued);
        }
        if state.phase() == Phase::Done {
            self.write_final_locked(state);
        }
    }

    fn write_final_locked(&self, state: &mut MasterState) {
        if state.results_written {
            return;
        }
        state.results_written = true;
        info!(
            opt_returned = state.opt_returned,
            fitness_reached = state.fitness_reached,
            "job done, writing final results"
        );
        let ranked = self.with_pool(|pool| pool.ranked(usize::MAX));
        if let Err(e) = self.snapshots.write_final(&ranked) {
            warn!(error = %e, "failed to write final snapshot");
        }
    }
}

impl<I: Individual> Job<I> for MasterJob<I> {
    fn next_task(&self) -> Option<Task<I>> {
        let mut state = self.state_write();
        self.issue_locked(&mut state)
    }

    fn submit_result(&self, result: TaskResult<I>) -> JobStatus {
        let init = self.state_read().phase().is_init();
        let lineage = result.lineage;

        if init {
            if let Some(individual) = result.accepted_value() {
                self.with_pool(|pool| pool.add_forced(individual));
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
        }

        {
            let mut state = self.state_write();
            self.advance_locked(&mut state, init, 1);
        }

        self.status()
    }

    fn next_init_tasks(&self, max_tasks: usize, no_proxies: usize) -> Vec<Task<I>> {
        let mut state = self.state_write();
        let share = state.pool_size.div_ceil(no_proxies.max(1));
        let wanted = max_tasks.min(share);

        let mut tasks = Vec::with_capacity(wanted);
        while tasks.len() < wanted && state.phase() == Phase::InitIssuing {
            match self.issue_locked(&mut state) {
                Some(task) => tasks.push(task),
                None => break,
            }
        }
        tasks
    }

    fn next_opt_chunk(&self, max_tasks: usize) -> ChunkReservation {
        let mut state = self.state_write();
        match state.phase() {
            Phase::InitIssuing | Phase::InitDraining => ChunkReservation::NotReady,
            Phase::OptIssuing => {
                let count = max_tasks.min(state.opt_target - state.opt_issued);
                if count == 0 {
                    return ChunkReservation::NotReady;
                }
                let id_offset = IndividualId((state.pool_size + state.opt_issued) as u64);
                state.opt_issued += count;
                if state.opt_issued == state.opt_target {
                    info!(issued = state.opt_issued, "all optimization tasks issued");
                }
                ChunkReservation::Granted { id_offset, count }
            }
            Phase::OptDraining | Phase::Done => ChunkReservation::Exhausted,
        }
    }

    fn merge_pools(
        &self,
        assoc_results: usize,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Vec<I> {
        let init = self.state_read().phase().is_init();
        if init && individuals.len() != assoc_results {
            warn!(
                assoc_results,
                returned = individuals.len(),
                "client returned a different number of initial individuals than it was issued"
            );
        }

        let merged = self.with_pool_write(|pool| {
            for individual in individuals {
                if individual.id() < chunk_start {
                    pool.add_checked(individual);
                } else if init {
                    pool.add_forced(individual);
                } else {
                    pool.add(individual);
                }
            }
            pool.ranked(max_back)
        });

        {
            let mut state = self.state_write();
            self.advance_locked(&mut state, init, assoc_results);
        }

        merged
    }

    fn is_waiting(&self) -> bool {
        self.state_read().phase().is_draining()
    }

    fn is_finished(&self) -> bool {
        {
            let state = self.state_read();
            if state.results_written {
                return true;
            }
        }

        let reached = self.with_pool(|pool| pool.acceptable_fitness_reached());

        let mut state = self.state_write();
        if reached && !state.fitness_reached {
            info!("acceptable fitness reached, stopping early");
            state.fitness_reached = true;
        }
        if state.phase() == Phase::Done {
            self.write_final_locked(&mut state);
            true
        } else {
            false
        }
    }

    fn progress(&self) -> JobProgress {
        let state = self.state_read();
        JobProgress {
            kind: "master".to_string(),
            phase: state.phase(),
            init_target: state.pool_size,
            init_issued: state.init_issued,
            init_returned: state.init_returned,
            opt_target: state.opt_target,
            opt_issued: state.opt_issued,
            opt_returned: state.opt_returned,
        }
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
