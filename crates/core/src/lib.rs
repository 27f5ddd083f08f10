// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! brood-core: distribution and fault tolerance for generational optimization runs
//!
//! This crate provides:
//! - Task/Result transfer types and the status codes that drive clients
//! - Job state machines (master, chunk-aggregating proxy, no-op)
//! - Client registry with timeout-driven eviction and dummy injection
//! - A transport-agnostic coordinator façade and the `Upstream` client trait
//! - Heartbeat, single-task worker loop and a threaded local backend
//! - A reference benchmark payload (`bench`) implementing the collaborator traits

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod id;

pub mod adapters;
pub mod auth;
pub mod bench;
pub mod config;
pub mod exit;
pub mod status;
pub mod task;

// Coordination (order matters for dependencies)
pub mod job;
pub mod registry;
pub mod upstream;
pub mod coordinator;
pub mod traced;

// Clients
pub mod heartbeat;
pub mod threaded;
pub mod worker;

// Re-exports
pub use adapters::{Breeder, FamilyRecord, History, Individual, Population, SinkError, SnapshotWriter};
pub use auth::{KeyVerdict, Secret};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, RunConfig};
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorSummary, SweepSummary};
pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatFailure};
pub use id::{ClientId, ClientIdGen, IndividualId};
pub use job::{AnyJob, ChunkReservation, Job, JobDeps, JobKind, JobProgress, Phase};
pub use registry::{ClientRegistry, OutstandingWork, SweepReport, Timeouts};
pub use status::JobStatus;
pub use task::{Lineage, SeedSource, Task, TaskKind, TaskResult};
pub use threaded::{BackendError, BackendStats, ThreadedBackend, ThreadedConfig};
pub use traced::TracedUpstream;
pub use upstream::{synchronize_pool, OptChunk, Registration, SyncError, TransportError, Upstream};
pub use worker::{WorkerError, WorkerOptions, WorkerReport};
