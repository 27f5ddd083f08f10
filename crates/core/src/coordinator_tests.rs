// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::{FakeBreeder, FakeHistory, FakeSnapshots, Population};
use crate::auth::Secret;
use crate::bench::{Candidate, RankedPool};
use crate::clock::FakeClock;
use crate::job::{JobDeps, MasterJob, MasterSettings, NoOpJob, Phase};
use crate::registry::Timeouts;
use crate::traced::TracedUpstream;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "sesame";

struct Harness {
    coordinator: Coordinator<Candidate, FakeClock>,
    clock: FakeClock,
    pool: Arc<RankedPool<Candidate>>,
    history: Arc<FakeHistory>,
}

fn timeouts() -> Timeouts {
    Timeouts {
        contact: Duration::from_secs(60),
        job: Duration::from_secs(10),
    }
}

fn master(pool_size: usize, iterations: usize) -> Harness {
    let clock = FakeClock::new();
    let pool = Arc::new(RankedPool::new(pool_size));
    let history = Arc::new(FakeHistory::new());
    let job = MasterJob::new(
        MasterSettings {
            pool_size,
            glob_opt_iterations: iterations,
        },
        Candidate::template(2),
        Vec::new(),
        JobDeps {
            pool: Box::new(pool.clone()),
            history: history.clone(),
            snapshots: Arc::new(FakeSnapshots::new()),
        },
    );
    let registry = ClientRegistry::new(clock.clone(), timeouts(), Secret::new(SECRET));
    Harness {
        coordinator: Coordinator::new(AnyJob::Master(job), registry, 1),
        clock,
        pool,
        history,
    }
}

fn key() -> String {
    Secret::new(SECRET).client_key()
}

fn register(h: &Harness) -> ClientId {
    h.coordinator.register(&key()).unwrap().client
}

fn execute(task: &Task<Candidate>, client: ClientId) -> TaskResult<Candidate> {
    task.execute(client, &FakeBreeder::default())
}

#[test]
fn single_client_runs_both_phases_to_finish() {
    let h = master(4, 10);
    let client = register(&h);

    let mut ids = Vec::new();
    let mut statuses = Vec::new();
    while let Some(task) = h.coordinator.get_task(client).unwrap() {
        ids.push(task.id.0);
        statuses.push(h.coordinator.return_result(client, execute(&task, client)).unwrap());
    }

    assert_eq!(ids, (0..14).collect::<Vec<_>>());
    assert!(statuses[..13].iter().all(|s| *s == JobStatus::Continue));
    assert_eq!(statuses[13], JobStatus::Finish);
    assert_eq!(h.history.records().len(), 10);
    // Finishing retires the only client.
    assert!(h.coordinator.is_everything_done());
}

#[test]
fn vanished_client_is_replaced_by_a_dummy() {
    let h = master(4, 2);
    let a = register(&h);
    let b = register(&h);

    for _ in 0..2 {
        let task = h.coordinator.get_task(a).unwrap().unwrap();
        h.coordinator.return_result(a, execute(&task, a)).unwrap();
    }
    let lost = h.coordinator.get_task(a).unwrap().unwrap();
    assert_eq!(lost.id, IndividualId(2));

    let task = h.coordinator.get_task(b).unwrap().unwrap();
    assert_eq!(h.coordinator.return_result(b, execute(&task, b)).unwrap(), JobStatus::Waiting);
    assert!(h.coordinator.get_task(b).unwrap().is_none());
    assert_eq!(h.coordinator.poll(b).unwrap(), JobStatus::Waiting);

    h.clock.advance(Duration::from_secs(10));
    let summary = h.coordinator.sweep();

    assert_eq!(summary.dummies, 1);
    assert_eq!(summary.evicted, vec![a]);
    let progress = h.coordinator.job().progress();
    assert_eq!(progress.init_returned, 4);
    assert_eq!(progress.phase, Phase::OptIssuing);
    assert_eq!(h.coordinator.poll(b).unwrap(), JobStatus::Continue);

    // The real result shows up late and is discarded.
    let status = h.coordinator.return_result(a, execute(&lost, a)).unwrap();
    assert_eq!(status, JobStatus::Continue);
    assert_eq!(h.coordinator.job().progress().init_returned, 4);
    assert_eq!(h.pool.len(), 3);
}

#[test]
fn asking_again_before_returning_resends_the_held_task() {
    let h = master(2, 1);
    let client = register(&h);

    let first = h.coordinator.get_task(client).unwrap().unwrap();
    let again = h.coordinator.get_task(client).unwrap().unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(h.coordinator.job().progress().init_issued, 1);
    assert_eq!(h.coordinator.registry().outstanding_count(client), 1);

    h.coordinator.return_result(client, execute(&again, client)).unwrap();
    let second = h.coordinator.get_task(client).unwrap().unwrap();
    assert_eq!(second.id, IndividualId(1));
    h.coordinator.return_result(client, execute(&second, client)).unwrap();

    assert_eq!(h.coordinator.job().progress().phase, Phase::OptIssuing);
}

#[test]
fn duplicate_return_is_applied_once() {
    let h = master(2, 1);
    let client = register(&h);
    let task = h.coordinator.get_task(client).unwrap().unwrap();
    let result = execute(&task, client);

    h.coordinator.return_result(client, result.clone()).unwrap();
    let status = h.coordinator.return_result(client, result).unwrap();

    assert_eq!(status, JobStatus::Continue);
    assert_eq!(h.coordinator.job().progress().init_returned, 1);
    assert_eq!(h.pool.len(), 1);
}

#[test]
fn wrong_key_yields_sentinel_and_no_record() {
    let h = master(2, 1);

    let registration = h.coordinator.register("Client speaking, I am here. guess").unwrap();

    assert_ne!(registration.message, Secret::new(SECRET).success_reply());
    assert_eq!(registration.client, ClientId::UNREGISTERED);
    assert!(matches!(
        h.coordinator.get_task(ClientId::UNREGISTERED),
        Err(CoordinatorError::UnknownClient(_))
    ));
    assert!(matches!(
        h.coordinator.get_task(ClientId(0)),
        Err(CoordinatorError::UnknownClient(_))
    ));
}

#[test]
fn return_without_outstanding_task_mutates_nothing() {
    let h = master(2, 1);
    let client = register(&h);
    let forged = TaskResult::success(
        Candidate::new(IndividualId(0), vec![0.0, 0.0]).with_fitness(1.0),
        client,
        crate::task::Lineage::orphan(IndividualId(0)),
    );

    let status = h.coordinator.return_result(client, forged).unwrap();

    assert_eq!(status, JobStatus::Continue);
    assert_eq!(h.pool.len(), 0);
    let progress = h.coordinator.job().progress();
    assert_eq!(progress.init_issued, 0);
    assert_eq!(progress.init_returned, 0);
}

#[test]
fn chunked_clients_drive_master_through_sync() {
    let h = master(2, 4);
    let p = register(&h);
    let q = register(&h);

    let tasks = h.coordinator.get_init_chunk(p, 10).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(h.coordinator.get_opt_chunk(q, 3).unwrap().status, JobStatus::Waiting);

    let individuals: Vec<_> = tasks.iter().filter_map(|t| execute(t, p).value).collect();
    let back = h.coordinator.sync_pool(p, individuals, 2, IndividualId(0)).unwrap();
    assert_eq!(back.len(), 2);

    let first = h.coordinator.get_opt_chunk(p, 3).unwrap();
    assert_eq!((first.status, first.id_offset, first.count), (JobStatus::Continue, IndividualId(2), 3));
    let second = h.coordinator.get_opt_chunk(q, 3).unwrap();
    assert_eq!((second.status, second.id_offset, second.count), (JobStatus::Continue, IndividualId(5), 1));
    assert_eq!(h.coordinator.get_opt_chunk(p, 3).unwrap().status, JobStatus::Waiting);

    h.coordinator.sync_pool(p, Vec::new(), 2, first.id_offset).unwrap();
    assert!(!h.coordinator.job().is_finished());
    h.coordinator.sync_pool(q, Vec::new(), 2, second.id_offset).unwrap();

    assert!(h.coordinator.job().is_finished());
    assert_eq!(h.coordinator.get_opt_chunk(q, 3).unwrap().status, JobStatus::Finish);
    assert_eq!(h.coordinator.poll(p).unwrap(), JobStatus::Finish);
    assert!(h.coordinator.is_everything_done());
}

#[test]
fn sync_after_eviction_discards_individuals() {
    let h = master(2, 2);
    let p = register(&h);
    let tasks = h.coordinator.get_init_chunk(p, 10).unwrap();

    h.clock.advance(Duration::from_secs(10));
    assert_eq!(h.coordinator.sweep().dummies, 2);

    let individuals: Vec<_> = tasks.iter().filter_map(|t| execute(t, p).value).collect();
    h.coordinator.sync_pool(p, individuals, 2, IndividualId(0)).unwrap();

    assert_eq!(h.pool.len(), 0);
    assert_eq!(h.coordinator.job().progress().init_returned, 2);
}

#[test]
fn everything_done_waits_for_contacts_to_lapse() {
    let h = master(1, 0);
    let worker = register(&h);
    let idle = register(&h);

    let task = h.coordinator.get_task(worker).unwrap().unwrap();
    assert_eq!(h.coordinator.return_result(worker, execute(&task, worker)).unwrap(), JobStatus::Finish);
    assert!(!h.coordinator.is_everything_done());

    h.clock.advance(Duration::from_secs(60));
    h.coordinator.sweep();
    assert!(h.coordinator.is_everything_done());
    assert!(h.coordinator.registry().is_known(idle));
}

#[test]
fn unsupported_job_refuses_registration() {
    let clock = FakeClock::new();
    let registry = ClientRegistry::new(clock, timeouts(), Secret::new(SECRET));
    let coordinator: Coordinator<Candidate, FakeClock> =
        Coordinator::new(AnyJob::NoOp(NoOpJob::unsupported("job kind 'switch'")), registry, 1);

    let result = coordinator.register(&key());

    assert!(matches!(result, Err(CoordinatorError::Unhealthy(reason)) if reason.contains("switch")));
    assert!(!coordinator.is_healthy());
    assert!(!coordinator.summary().healthy);
}

#[test]
fn traced_upstream_passes_calls_through() {
    let h = master(1, 0);
    let upstream: TracedUpstream<_, Candidate> = TracedUpstream::new(Arc::new(h.coordinator));

    let registration = upstream.register(&key()).unwrap();
    assert!(registration.is_accepted());
    assert!(upstream.is_alive(registration.client).unwrap());
    let task = upstream.get_task(registration.client).unwrap().unwrap();
    let status = upstream
        .return_result(registration.client, execute(&task, registration.client))
        .unwrap();

    assert_eq!(status, JobStatus::Finish);
    assert!(matches!(
        upstream.poll(ClientId(99)),
        Err(TransportError::Rejected(_))
    ));
}
