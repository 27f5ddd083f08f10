// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake collaborators for testing

use super::traits::*;
use crate::bench::{Candidate, RankedPool};
use crate::id::{ClientId, IndividualId};
use crate::status::JobStatus;
use crate::task::{SeedSource, Task, TaskResult};
use crate::upstream::{OptChunk, Registration, TransportError, Upstream};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Which merge path a population insert went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPath {
    Competitive,
    Forced,
    Checked,
}

/// Ranked pool that records every insert path, keyed by individual ID
pub struct RecordingPopulation<I> {
    inner: RankedPool<I>,
    calls: Mutex<Vec<(IndividualId, AddPath)>>,
}

impl<I: Individual> RecordingPopulation<I> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RankedPool::new(capacity),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_acceptable_fitness(mut self, threshold: Option<f64>) -> Self {
        self.inner = self.inner.with_acceptable_fitness(threshold);
        self
    }

    pub fn calls(&self) -> Vec<(IndividualId, AddPath)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn paths_for(&self, id: IndividualId) -> Vec<AddPath> {
        self.calls()
            .into_iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, p)| p)
            .collect()
    }

    fn record(&self, id: IndividualId, path: AddPath) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, path));
    }
}

impl<I: Individual> Population<I> for RecordingPopulation<I> {
    fn add(&self, individual: I) -> bool {
        self.record(individual.id(), AddPath::Competitive);
        self.inner.add(individual)
    }

    fn add_forced(&self, individual: I) {
        self.record(individual.id(), AddPath::Forced);
        self.inner.add_forced(individual)
    }

    fn add_checked(&self, individual: I) -> bool {
        self.record(individual.id(), AddPath::Checked);
        self.inner.add_checked(individual)
    }

    fn parents(&self) -> Option<(I, I)> {
        self.inner.parents()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn acceptable_fitness_reached(&self) -> bool {
        self.inner.acceptable_fitness_reached()
    }

    fn ranked(&self, limit: usize) -> Vec<I> {
        self.inner.ranked(limit)
    }

    fn take_best_since(&self, since: IndividualId, limit: usize) -> Vec<I> {
        self.inner.take_best_since(since, limit)
    }

    fn replace_all(&self, individuals: Vec<I>) {
        self.inner.replace_all(individuals)
    }
}

/// Deterministic breeder: init fitness is `100 + id`, children beat their best parent by 0.5
#[derive(Clone, Default)]
pub struct FakeBreeder {
    failing: Arc<HashSet<IndividualId>>,
    id_skew: u64,
    calls: Arc<AtomicUsize>,
}

impl FakeBreeder {
    /// Fail every task whose ID is in `ids`
    pub fn failing_on(ids: impl IntoIterator<Item = IndividualId>) -> Self {
        Self {
            failing: Arc::new(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Produce individuals whose ID is off by `skew`
    pub fn with_id_skew(mut self, skew: u64) -> Self {
        self.id_skew = skew;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn produce(&self, id: IndividualId, genome: Vec<f64>, fitness: f64) -> Option<Candidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&id) {
            return None;
        }
        Some(Candidate::new(IndividualId(id.0 + self.id_skew), genome).with_fitness(fitness))
    }
}

impl Breeder<Candidate> for FakeBreeder {
    fn initialize(&self, template: &Candidate, id: IndividualId) -> Option<Candidate> {
        self.produce(id, template.genome.clone(), 100.0 + id.0 as f64)
    }

    fn seed(&self, template: &Candidate, _source: &SeedSource, id: IndividualId) -> Option<Candidate> {
        self.produce(id, template.genome.clone(), 50.0 + id.0 as f64)
    }

    fn breed(&self, mother: &Candidate, father: &Candidate, id: IndividualId) -> Option<Candidate> {
        let best = mother.fitness.min(father.fitness);
        self.produce(id, mother.genome.clone(), best - 0.5)
    }
}

/// History sink that keeps every record in memory
#[derive(Default)]
pub struct FakeHistory {
    records: Mutex<Vec<FamilyRecord>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FamilyRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of records for `child`
    pub fn count_for(&self, child: IndividualId) -> usize {
        self.records().iter().filter(|r| r.child == child).count()
    }
}

impl History for FakeHistory {
    fn record_family(&self, record: FamilyRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }
}

/// Snapshot sink counting writes and remembering their sizes
#[derive(Default)]
pub struct FakeSnapshots {
    initial: Mutex<Vec<usize>>,
    finals: Mutex<Vec<usize>>,
}

impl FakeSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_writes(&self) -> Vec<usize> {
        self.initial.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn final_writes(&self) -> Vec<usize> {
        self.finals.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl<I> SnapshotWriter<I> for FakeSnapshots {
    fn write_initial(&self, ranked: &[I]) -> Result<(), SinkError> {
        self.initial
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ranked.len());
        Ok(())
    }

    fn write_final(&self, ranked: &[I]) -> Result<(), SinkError> {
        self.finals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ranked.len());
        Ok(())
    }
}

/// Upstream with canned chunk answers and a synthetic pool
pub struct ScriptedUpstream {
    init_chunks: Mutex<VecDeque<Vec<Task<Candidate>>>>,
    opt_chunks: Mutex<VecDeque<OptChunk>>,
    // Answer once the scripted chunks run out
    fallback: JobStatus,
    fail_init: bool,
    // Individuals returned beyond what was asked for
    sync_extra: usize,
    // (sent, max_back)
    syncs: Mutex<Vec<(usize, usize)>>,
    opt_requests: AtomicUsize,
}

impl Default for ScriptedUpstream {
    fn default() -> Self {
        Self {
            init_chunks: Mutex::new(VecDeque::new()),
            opt_chunks: Mutex::new(VecDeque::new()),
            fallback: JobStatus::Finish,
            fail_init: false,
            sync_extra: 0,
            syncs: Mutex::new(Vec::new()),
            opt_requests: AtomicUsize::new(0),
        }
    }
}

impl ScriptedUpstream {
    /// Queue an initial chunk of `count` tasks with IDs from zero
    pub fn with_init(self, count: u64) -> Self {
        let tasks = (0..count)
            .map(|i| Task::init(IndividualId(i), Candidate::template(2)))
            .collect();
        self.init_chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(tasks);
        self
    }

    pub fn with_opt(self, chunk: OptChunk) -> Self {
        self.opt_chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(chunk);
        self
    }

    /// Answer `status` to every chunk request past the scripted ones
    pub fn answering(mut self, status: JobStatus) -> Self {
        self.fallback = status;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_sync_extra(mut self, extra: usize) -> Self {
        self.sync_extra = extra;
        self
    }

    pub fn syncs(&self) -> Vec<(usize, usize)> {
        self.syncs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn opt_requests(&self) -> usize {
        self.opt_requests.load(Ordering::SeqCst)
    }
}

impl Upstream<Candidate> for ScriptedUpstream {
    fn register(&self, _key: &str) -> Result<Registration, TransportError> {
        Ok(Registration {
            message: "ok".to_string(),
            client: ClientId(0),
        })
    }

    fn get_task(&self, _client: ClientId) -> Result<Option<Task<Candidate>>, TransportError> {
        Ok(None)
    }

    fn return_result(
        &self,
        _client: ClientId,
        _result: TaskResult<Candidate>,
    ) -> Result<JobStatus, TransportError> {
        Ok(JobStatus::Continue)
    }

    fn poll(&self, _client: ClientId) -> Result<JobStatus, TransportError> {
        Ok(JobStatus::Continue)
    }

    fn is_alive(&self, _client: ClientId) -> Result<bool, TransportError> {
        Ok(true)
    }

    fn get_init_chunk(
        &self,
        _client: ClientId,
        _max_tasks: usize,
    ) -> Result<Vec<Task<Candidate>>, TransportError> {
        if self.fail_init {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            )));
        }
        Ok(self
            .init_chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default())
    }

    fn get_opt_chunk(&self, _client: ClientId, _max_tasks: usize) -> Result<OptChunk, TransportError> {
        self.opt_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .opt_chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(OptChunk::status(self.fallback)))
    }

    fn sync_pool(
        &self,
        _client: ClientId,
        individuals: Vec<Candidate>,
        max_back: usize,
        _chunk_start: IndividualId,
    ) -> Result<Vec<Candidate>, TransportError> {
        self.syncs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((individuals.len(), max_back));
        Ok((0..(max_back + self.sync_extra) as u64)
            .map(|k| Candidate::new(IndividualId(1000 + k), vec![0.0, 0.0]).with_fitness(k as f64))
            .collect())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
