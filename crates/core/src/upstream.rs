// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side view of a master: the calls a worker, proxy or threaded
//! backend makes against whoever hands out its work.
//!
//! Calls are blocking. The in-process [`Coordinator`](crate::Coordinator)
//! implements this trait directly; the daemon crate provides a remote
//! implementation over TCP.

use crate::adapters::{Individual, Population};
use crate::id::{ClientId, IndividualId};
use crate::status::JobStatus;
use crate::task::{Task, TaskResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Answer to a registration handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub message: String,
    pub client: ClientId,
}

impl Registration {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            client: ClientId::UNREGISTERED,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.client.is_registered()
    }
}

/// Answer to an optimization chunk request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptChunk {
    pub status: JobStatus,
    pub id_offset: IndividualId,
    pub count: usize,
}

impl OptChunk {
    /// A status-only answer carrying no range
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            id_offset: IndividualId(0),
            count: 0,
        }
    }
}

/// Errors talking to an upstream
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("rejected by upstream: {0}")]
    Rejected(String),
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl TransportError {
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect { .. })
    }
}

/// Failure reconciling a local pool with an upstream
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("upstream returned {got} individuals, asked for {limit}")]
    Overflow { got: usize, limit: usize },
}

pub trait Upstream<I>: Send + Sync {
    fn register(&self, key: &str) -> Result<Registration, TransportError>;

    /// `None` while the job is draining or finished
    fn get_task(&self, client: ClientId) -> Result<Option<Task<I>>, TransportError>;

    fn return_result(&self, client: ClientId, result: TaskResult<I>) -> Result<JobStatus, TransportError>;

    /// Status query without a result, used while waiting
    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError>;

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError>;

    fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<I>>, TransportError>;

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError>;

    /// Send local individuals, receive up to `max_back` of the merged pool
    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<I>, TransportError>;
}

impl<I, U: Upstream<I> + ?Sized> Upstream<I> for std::sync::Arc<U> {
    fn register(&self, key: &str) -> Result<Registration, TransportError> {
        (**self).register(key)
    }

    fn get_task(&self, client: ClientId) -> Result<Option<Task<I>>, TransportError> {
        (**self).get_task(client)
    }

    fn return_result(&self, client: ClientId, result: TaskResult<I>) -> Result<JobStatus, TransportError> {
        (**self).return_result(client, result)
    }

    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError> {
        (**self).poll(client)
    }

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError> {
        (**self).is_alive(client)
    }

    fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<I>>, TransportError> {
        (**self).get_init_chunk(client, max_tasks)
    }

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError> {
        (**self).get_opt_chunk(client, max_tasks)
    }

    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<I>, TransportError> {
        (**self).sync_pool(client, individuals, max_back, chunk_start)
    }
}

/// Reconcile a local pool fragment with the upstream's pool.
///
/// With `max_exchange` below the local capacity, up to that many of the best
/// individuals with `id >= chunk_start` are moved upstream and the answer is
/// merged back (older IDs through the duplicate check). Otherwise the whole
/// pool is sent and replaced by the answer. Returns how many came back.
pub fn synchronize_pool<I: Individual>(
    upstream: &dyn Upstream<I>,
    client: ClientId,
    pool: &dyn Population<I>,
    chunk_start: IndividualId,
    max_exchange: Option<usize>,
) -> Result<usize, SyncError> {
    match max_exchange.filter(|n| *n < pool.capacity()) {
        Some(limit) => {
            let sent = pool.take_best_since(chunk_start, limit);
            let back = upstream.sync_pool(client, sent, limit, chunk_start)?;
            if back.len() > limit {
                return Err(SyncError::Overflow {
                    got: back.len(),
                    limit,
                });
            }
            let received = back.len();
            for individual in back {
                if individual.id() < chunk_start {
                    pool.add_checked(individual);
                } else {
                    pool.add_forced(individual);
                }
            }
            Ok(received)
        }
        None => {
            let capacity = pool.capacity();
            let sent = pool.ranked(capacity);
            let back = upstream.sync_pool(client, sent, capacity, chunk_start)?;
            if back.len() > capacity {
                return Err(SyncError::Overflow {
                    got: back.len(),
                    limit: capacity,
                });
            }
            let received = back.len();
            pool.replace_all(back);
            Ok(received)
        }
    }
}
