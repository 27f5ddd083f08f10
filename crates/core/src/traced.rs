// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced upstream wrapper for consistent observability

use crate::id::{ClientId, IndividualId};
use crate::status::JobStatus;
use crate::task::{Task, TaskResult};
use crate::upstream::{OptChunk, Registration, TransportError, Upstream};
use std::marker::PhantomData;
use std::time::Instant;

/// Wrapper that adds tracing to any Upstream
pub struct TracedUpstream<U, I> {
    inner: U,
    _individual: PhantomData<fn() -> I>,
}

impl<U, I> TracedUpstream<U, I> {
    pub fn new(inner: U) -> Self {
        Self {
            inner,
            _individual: PhantomData,
        }
    }

    pub fn inner(&self) -> &U {
        &self.inner
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl<I, U: Upstream<I>> Upstream<I> for TracedUpstream<U, I> {
    fn register(&self, key: &str) -> Result<Registration, TransportError> {
        let span = tracing::info_span!("upstream.register");
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.register(key);
        match &result {
            Ok(reg) if reg.is_accepted() => tracing::info!(
                client = %reg.client,
                elapsed_ms = elapsed_ms(start),
                "registered"
            ),
            Ok(reg) => tracing::warn!(message = %reg.message, "registration refused"),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "register failed"),
        }
        result
    }

    fn get_task(&self, client: ClientId) -> Result<Option<Task<I>>, TransportError> {
        let span = tracing::debug_span!("upstream.get_task", %client);
        let _guard = span.enter();

        let result = self.inner.get_task(client);
        match &result {
            Ok(Some(task)) => tracing::debug!(task = %task.id, "got task"),
            Ok(None) => tracing::debug!("no task available"),
            Err(e) => tracing::error!(error = %e, "get_task failed"),
        }
        result
    }

    fn return_result(&self, client: ClientId, result: TaskResult<I>) -> Result<JobStatus, TransportError> {
        let span = tracing::debug_span!("upstream.return_result", %client, child = %result.lineage.child);
        let _guard = span.enter();

        let ok = result.ok;
        let answer = self.inner.return_result(client, result);
        match &answer {
            Ok(status) => tracing::debug!(ok, %status, "result returned"),
            Err(e) => tracing::error!(error = %e, "return failed"),
        }
        answer
    }

    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError> {
        let result = self.inner.poll(client);
        tracing::trace!(%client, status = ?result.as_ref().ok(), "polled");
        result
    }

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError> {
        let result = self.inner.is_alive(client);
        tracing::trace!(%client, alive = ?result.as_ref().ok(), "checked");
        result
    }

    fn get_init_chunk(&self, client: ClientId, max_tasks: usize) -> Result<Vec<Task<I>>, TransportError> {
        let span = tracing::info_span!("upstream.get_init_chunk", %client, max_tasks);
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.get_init_chunk(client, max_tasks);
        match &result {
            Ok(tasks) => tracing::info!(
                tasks = tasks.len(),
                elapsed_ms = elapsed_ms(start),
                "init chunk fetched"
            ),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "init chunk failed"),
        }
        result
    }

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError> {
        let span = tracing::info_span!("upstream.get_opt_chunk", %client, max_tasks);
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.get_opt_chunk(client, max_tasks);
        match &result {
            Ok(chunk) => tracing::info!(
                status = %chunk.status,
                id_offset = %chunk.id_offset,
                count = chunk.count,
                elapsed_ms = elapsed_ms(start),
                "opt chunk answered"
            ),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "opt chunk failed"),
        }
        result
    }

    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<I>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<I>, TransportError> {
        let span = tracing::info_span!("upstream.sync_pool", %client, %chunk_start, max_back);
        let _guard = span.enter();

        tracing::debug!(sent = individuals.len(), "syncing");
        let start = Instant::now();
        let result = self.inner.sync_pool(client, individuals, max_back, chunk_start);
        match &result {
            Ok(back) => tracing::info!(
                received = back.len(),
                elapsed_ms = elapsed_ms(start),
                "pool synced"
            ),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "sync failed"),
        }
        result
    }
}
