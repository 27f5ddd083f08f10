// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{FakeBreeder, FakeHistory, FakeSnapshots, ScriptedUpstream};
use crate::auth::Secret;
use crate::bench::{Candidate, RankedPool};
use crate::clock::FakeClock;
use crate::coordinator::Coordinator;
use crate::heartbeat::HeartbeatConfig;
use crate::job::{AnyJob, JobDeps, MasterJob, MasterSettings};
use crate::registry::{ClientRegistry, Timeouts};
use crate::upstream::{OptChunk, Registration, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Master = Coordinator<Candidate, FakeClock>;

fn master(pool_size: usize, iterations: usize) -> Master {
    let job = MasterJob::new(
        MasterSettings {
            pool_size,
            glob_opt_iterations: iterations,
        },
        Candidate::template(2),
        Vec::new(),
        JobDeps {
            pool: Box::new(RankedPool::new(pool_size)),
            history: Arc::new(FakeHistory::new()),
            snapshots: Arc::new(FakeSnapshots::new()),
        },
    );
    let registry = ClientRegistry::new(FakeClock::new(), Timeouts::default(), Secret::new("k"));
    Coordinator::new(AnyJob::Master(job), registry, 1)
}

/// Delegates to a real master and records every sync
struct RecordingUpstream {
    inner: Master,
    // (sent, max_back, received)
    syncs: Mutex<Vec<(usize, usize, usize)>>,
}

impl Upstream<Candidate> for RecordingUpstream {
    fn register(&self, key: &str) -> Result<Registration, TransportError> {
        Upstream::register(&self.inner, key)
    }

    fn get_task(&self, client: ClientId) -> Result<Option<Task<Candidate>>, TransportError> {
        Upstream::get_task(&self.inner, client)
    }

    fn return_result(&self, client: ClientId, result: TaskResult<Candidate>) -> Result<JobStatus, TransportError> {
        Upstream::return_result(&self.inner, client, result)
    }

    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError> {
        Upstream::poll(&self.inner, client)
    }

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError> {
        Upstream::is_alive(&self.inner, client)
    }

    fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<Candidate>>, TransportError> {
        Upstream::get_init_chunk(&self.inner, client, max_tasks)
    }

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError> {
        Upstream::get_opt_chunk(&self.inner, client, max_tasks)
    }

    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<Candidate>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<Candidate>, TransportError> {
        let sent = individuals.len();
        let back = Upstream::sync_pool(&self.inner, client, individuals, max_back, chunk_start)?;
        self.syncs.lock().unwrap().push((sent, max_back, back.len()));
        Ok(back)
    }
}

fn proxy(upstream: Arc<dyn Upstream<Candidate>>, capacity: usize, max_exchange: Option<usize>) -> ProxyJob<Candidate> {
    ProxyJob::new(
        ProxySettings {
            client: ClientId(0),
            max_tasks: 4,
            max_exchange,
        },
        upstream,
        Box::new(RankedPool::new(capacity)),
        Arc::new(FakeHistory::new()),
    )
}

/// Act as the proxy's local clients until it stops handing out work
fn drain(job: &ProxyJob<Candidate>) -> JobStatus {
    let breeder = FakeBreeder::default();
    for _ in 0..1000 {
        match job.next_task() {
            Some(task) => {
                job.submit_result(task.execute(ClientId(7), &breeder));
            }
            None => match job.status() {
                JobStatus::Finish | JobStatus::Snafu => return job.status(),
                _ => continue,
            },
        }
    }
    panic!("proxy did not settle: {:?}", job.progress());
}

#[test]
fn exchange_mode_never_moves_more_than_the_limit() {
    let upstream = Arc::new(RecordingUpstream {
        inner: master(6, 12),
        syncs: Mutex::new(Vec::new()),
    });
    let client = upstream.inner.register(&Secret::new("k").client_key()).unwrap().client;
    let job = ProxyJob::new(
        ProxySettings {
            client,
            max_tasks: 4,
            max_exchange: Some(2),
        },
        upstream.clone(),
        Box::new(RankedPool::new(5)),
        Arc::new(FakeHistory::new()),
    );

    assert_eq!(drain(&job), JobStatus::Finish);

    let syncs = upstream.syncs.lock().unwrap().clone();
    assert!(syncs.len() >= 2);
    for (sent, max_back, received) in syncs {
        assert!(sent <= 2, "sent {}", sent);
        assert_eq!(max_back, 2);
        assert!(received <= 2, "received {}", received);
    }
    let progress = upstream.inner.job().progress();
    assert_eq!(progress.init_returned, 6);
    assert_eq!(progress.opt_returned, 12);
}

#[test]
fn full_mode_replaces_the_local_pool() {
    let upstream = Arc::new(RecordingUpstream {
        inner: master(3, 5),
        syncs: Mutex::new(Vec::new()),
    });
    let client = upstream.inner.register(&Secret::new("k").client_key()).unwrap().client;
    let job = ProxyJob::new(
        ProxySettings {
            client,
            max_tasks: 10,
            max_exchange: None,
        },
        upstream.clone(),
        Box::new(RankedPool::new(3)),
        Arc::new(FakeHistory::new()),
    );

    assert_eq!(drain(&job), JobStatus::Finish);

    for (_, max_back, received) in upstream.syncs.lock().unwrap().iter() {
        assert_eq!(*max_back, 3);
        assert!(*received <= 3);
    }
    assert!(upstream.inner.job().is_finished());
}

#[test]
fn waiting_upstream_is_asked_again_on_next_task() {
    let upstream = Arc::new(
        ScriptedUpstream::default()
            .with_init(2)
            .with_opt(OptChunk::status(JobStatus::Waiting))
            .with_opt(OptChunk {
                status: JobStatus::Continue,
                id_offset: IndividualId(2),
                count: 1,
            }),
    );
    let job = proxy(upstream.clone(), 4, None);
    let breeder = FakeBreeder::default();

    let first = job.next_task().unwrap();
    let second = job.next_task().unwrap();
    assert!(job.next_task().is_none());
    assert_eq!(job.submit_result(first.execute(ClientId(1), &breeder)), JobStatus::Waiting);
    assert_eq!(job.submit_result(second.execute(ClientId(1), &breeder)), JobStatus::Waiting);
    assert_eq!(job.status(), JobStatus::Continue);

    let breed = job.next_task().unwrap();
    assert_eq!(breed.id, IndividualId(2));
    assert!(breed.is_breed());
    assert_eq!(job.submit_result(breed.execute(ClientId(1), &breeder)), JobStatus::Finish);
    assert_eq!(upstream.syncs().len(), 2);
}

#[test]
fn oversized_sync_answer_breaks_the_proxy() {
    let upstream = Arc::new(ScriptedUpstream::default().with_init(1).with_sync_extra(1));
    let job = proxy(upstream, 5, Some(2));

    let task = job.next_task().unwrap();
    let status = job.submit_result(task.execute(ClientId(1), &FakeBreeder::default()));

    assert_eq!(status, JobStatus::Snafu);
    assert_eq!(job.status(), JobStatus::Snafu);
    assert!(job.failure().unwrap().contains("returned 3"));
    assert!(job.next_task().is_none());
    assert!(!job.is_finished());
}

#[test]
fn transport_failure_breaks_the_proxy() {
    let upstream = Arc::new(ScriptedUpstream::default().failing_init());
    let job = proxy(upstream, 5, None);

    assert!(job.next_task().is_none());
    assert!(job.is_broken());
    assert_eq!(job.status(), JobStatus::Snafu);
    assert_eq!(job.progress().phase, Phase::Done);
}

#[test]
fn empty_initial_fetch_goes_straight_to_optimization() {
    let upstream = Arc::new(ScriptedUpstream::default().with_opt(OptChunk {
        status: JobStatus::Continue,
        id_offset: IndividualId(40),
        count: 2,
    }));
    let job = proxy(upstream.clone(), 5, None);

    // Full sync of an empty pool hands back five candidates to breed from.
    let task = job.next_task().unwrap();
    assert_eq!(task.id, IndividualId(40));
    assert_eq!(upstream.syncs(), vec![(0, 5)]);
}

#[test]
fn finishing_stops_the_heartbeat() {
    let probes = Arc::new(AtomicUsize::new(0));
    let counter = probes.clone();
    let heartbeat = Heartbeat::start(
        HeartbeatConfig::default()
            .with_period(Duration::from_millis(2))
            .with_max_jitter(Duration::ZERO),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        },
        |_| {},
    )
    .unwrap();
    let upstream = Arc::new(ScriptedUpstream::default().with_init(1));
    let job = proxy(upstream, 5, None).with_heartbeat(heartbeat);

    assert_eq!(drain(&job), JobStatus::Finish);
    let seen = probes.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(probes.load(Ordering::SeqCst), seen);
    assert!(job.is_finished());
}

#[test]
fn proxies_cannot_be_chained() {
    let job = proxy(Arc::new(ScriptedUpstream::default()), 5, None);

    assert!(job.next_init_tasks(10, 1).is_empty());
    assert_eq!(job.next_opt_chunk(10), ChunkReservation::Exhausted);
    assert!(job.merge_pools(3, Vec::new(), 5, IndividualId(0)).is_empty());
}
