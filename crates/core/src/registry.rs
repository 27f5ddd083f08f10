// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client registry: who holds which outstanding work, and since when
//!
//! Two independent clocks run per client. The issue timestamp governs
//! eviction (outstanding work is replaced by dummy results once it is older
//! than the job timeout). The contact timestamp governs presence (a client
//! not heard from within the contact timeout is dropped from the contact set).

use crate::adapters::Individual;
use crate::auth::{KeyVerdict, Secret};
use crate::clock::Clock;
use crate::id::{ClientId, ClientIdGen, IndividualId};
use crate::task::{Lineage, Task, TaskResult};
use crate::upstream::Registration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Presence: drop a client not heard from for this long
    #[serde(with = "humantime_serde")]
    pub contact: Duration,
    /// Eviction: replace outstanding work older than this with dummies
    #[serde(with = "humantime_serde")]
    pub job: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            contact: Duration::from_secs(10),
            job: Duration::from_secs(10),
        }
    }
}

/// Work a client holds
#[derive(Debug, Clone)]
pub enum OutstandingWork<I> {
    /// Single or initial task, carried so its own dummy can be produced
    Task(Task<I>),
    /// Optimization range handed out as a chunk
    Range { first: IndividualId, count: usize },
}

impl<I: Individual> OutstandingWork<I> {
    pub fn count(&self) -> usize {
        match self {
            OutstandingWork::Task(_) => 1,
            OutstandingWork::Range { count, .. } => *count,
        }
    }

    fn dummies(&self, worker: ClientId) -> Vec<TaskResult<I>> {
        match self {
            OutstandingWork::Task(task) => vec![task.dummy_answer(worker)],
            OutstandingWork::Range { first, count } => (0..*count)
                .map(|k| TaskResult::failure(worker, Lineage::orphan(first.offset(k))))
                .collect(),
        }
    }
}

struct Outstanding<I> {
    work: Vec<OutstandingWork<I>>,
    count: usize,
    issued_at: Instant,
}

struct RegistryState<I> {
    outstanding: HashMap<ClientId, Outstanding<I>>,
    contacts: HashMap<ClientId, Instant>,
    // Retired clients; pings must not bring them back
    finished: HashSet<ClientId>,
}

/// Outcome of one sweep
#[derive(Debug)]
pub struct SweepReport<I> {
    /// Synthetic failures to feed into the job, one per evicted unit of work
    pub dummies: Vec<TaskResult<I>>,
    pub evicted: Vec<ClientId>,
    pub stale: Vec<ClientId>,
}

impl<I> SweepReport<I> {
    pub fn is_empty(&self) -> bool {
        self.dummies.is_empty() && self.evicted.is_empty() && self.stale.is_empty()
    }
}

pub struct ClientRegistry<I, C: Clock> {
    clock: C,
    timeouts: Timeouts,
    secret: Secret,
    ids: ClientIdGen,
    state: Mutex<RegistryState<I>>,
}

impl<I: Individual, C: Clock> ClientRegistry<I, C> {
    pub fn new(clock: C, timeouts: Timeouts, secret: Secret) -> Self {
        Self {
            clock,
            timeouts,
            secret,
            ids: ClientIdGen::new(),
            state: Mutex::new(RegistryState {
                outstanding: HashMap::new(),
                contacts: HashMap::new(),
                finished: HashSet::new(),
            }),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<I>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate the handshake key and assign the next client ID
    pub fn register(&self, key: &str) -> Registration {
        match self.secret.check(key) {
            KeyVerdict::Accepted => {
                let client = self.ids.next();
                self.lock().contacts.insert(client, self.clock.now());
                info!(%client, "client registered");
                Registration {
                    message: self.secret.success_reply(),
                    client,
                }
            }
            verdict => {
                warn!(?verdict, "registration rejected");
                Registration::rejected(verdict.rejection().unwrap_or(crate::auth::WRONG_KEY))
            }
        }
    }

    /// Whether `client` was ever issued by this registry
    pub fn is_known(&self, client: ClientId) -> bool {
        self.ids.issued(client)
    }

    pub fn registered(&self) -> usize {
        self.ids.count().max(0) as usize
    }

    /// Hand `work` to `client`. Counts accumulate until the client returns.
    pub fn record_issue(&self, client: ClientId, work: OutstandingWork<I>) {
        let now = self.clock.now();
        let mut state = self.lock();
        let entry = state.outstanding.entry(client).or_insert_with(|| Outstanding {
            work: Vec::new(),
            count: 0,
            issued_at: now,
        });
        entry.count += work.count();
        entry.issued_at = now;
        entry.work.push(work);
        if !state.finished.contains(&client) {
            state.contacts.insert(client, now);
        }
    }

    /// Clear the client's outstanding entry, returning how much it covered.
    /// `None` means the client holds nothing and its return must be rejected.
    pub fn take_outstanding(&self, client: ClientId) -> Option<usize> {
        let now = self.clock.now();
        let mut state = self.lock();
        let taken = state.outstanding.remove(&client).map(|o| o.count);
        if !state.finished.contains(&client) {
            state.contacts.insert(client, now);
        }
        taken
    }

    /// The single task `client` still holds, if that is all it holds
    pub fn held_task(&self, client: ClientId) -> Option<Task<I>> {
        let now = self.clock.now();
        let mut state = self.lock();
        let held = match state.outstanding.get(&client).map(|o| o.work.as_slice()) {
            Some([OutstandingWork::Task(task)]) => Some(task.clone()),
            _ => None,
        };
        if !state.finished.contains(&client) {
            state.contacts.insert(client, now);
        }
        held
    }

    /// Clear the outstanding task with ID `child`. `false` means the client
    /// does not hold it and its result must be rejected.
    pub fn take_task(&self, client: ClientId, child: IndividualId) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        if !state.finished.contains(&client) {
            state.contacts.insert(client, now);
        }
        let Some(entry) = state.outstanding.get_mut(&client) else {
            return false;
        };
        let Some(at) = entry
            .work
            .iter()
            .position(|w| matches!(w, OutstandingWork::Task(task) if task.id == child))
        else {
            return false;
        };
        entry.work.remove(at);
        entry.count -= 1;
        if entry.work.is_empty() {
            state.outstanding.remove(&client);
        }
        true
    }

    pub fn outstanding_count(&self, client: ClientId) -> usize {
        self.lock().outstanding.get(&client).map_or(0, |o| o.count)
    }

    /// Stamp contact time
    pub fn ping(&self, client: ClientId) {
        let now = self.clock.now();
        let mut state = self.lock();
        if !state.finished.contains(&client) {
            state.contacts.insert(client, now);
        }
    }

    /// Forget a client that was told to finish
    pub fn retire(&self, client: ClientId) {
        let mut state = self.lock();
        if state.finished.insert(client) {
            info!(%client, "client retired");
        }
        state.contacts.remove(&client);
        if let Some(left) = state.outstanding.remove(&client) {
            warn!(%client, outstanding = left.count, "retired client still held work");
        }
    }

    /// No client has been heard from within the contact timeout
    pub fn all_quiesced(&self) -> bool {
        self.lock().contacts.is_empty()
    }

    pub fn active_contacts(&self) -> usize {
        self.lock().contacts.len()
    }

    pub fn outstanding_clients(&self) -> usize {
        self.lock().outstanding.len()
    }

    /// Evict timed-out work and drop stale contacts.
    ///
    /// Entries are removed as their dummies are produced, so a second sweep
    /// never produces dummies for the same work again.
    pub fn sweep(&self) -> SweepReport<I> {
        let now = self.clock.now();
        let mut state = self.lock();

        let expired: Vec<ClientId> = state
            .outstanding
            .iter()
            .filter(|(_, o)| now.saturating_duration_since(o.issued_at) >= self.timeouts.job)
            .map(|(client, _)| *client)
            .collect();

        let mut dummies = Vec::new();
        for client in &expired {
            if let Some(outstanding) = state.outstanding.remove(client) {
                warn!(
                    %client,
                    count = outstanding.count,
                    "job timeout, forcing dummy results"
                );
                for work in &outstanding.work {
                    dummies.extend(work.dummies(*client));
                }
            }
        }

        let stale: Vec<ClientId> = state
            .contacts
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) >= self.timeouts.contact)
            .map(|(client, _)| *client)
            .collect();
        for client in &stale {
            state.contacts.remove(client);
            info!(%client, "contact timeout, removing client");
        }

        SweepReport {
            dummies,
            evicted: expired,
            stale,
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
