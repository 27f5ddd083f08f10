// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-task client loop: fetch, execute, return, act on the status

use crate::adapters::{Breeder, Individual};
use crate::auth::Secret;
use crate::exit;
use crate::id::ClientId;
use crate::status::JobStatus;
use crate::task::TaskResult;
use crate::upstream::{TransportError, Upstream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("registration answered with an unexpected message: {0}")]
    WrongAnswer(String),
    #[error("could not register with the master: {0}")]
    Connect(#[source] TransportError),
    #[error("fetching a task failed: {0}")]
    GetTask(#[source] TransportError),
    #[error("handing back a result failed: {0}")]
    Return(#[source] TransportError),
    #[error("polling the master failed: {0}")]
    Poll(#[source] TransportError),
    #[error("master reported an unrecoverable state")]
    Snafu,
}

impl WorkerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::WrongAnswer(_) => exit::WRONG_ANSWER,
            WorkerError::Connect(_) => exit::CONNECT_FAILED,
            WorkerError::GetTask(_) => exit::GET_TASK_FAILED,
            WorkerError::Return(_) => exit::RETURN_FAILED,
            WorkerError::Poll(_) => exit::POLL_FAILED,
            WorkerError::Snafu => exit::SNAFU,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Sleep between polls while the master is waiting
    pub poll_interval: Duration,
    /// Wait before the single retry of a failed result hand-over
    pub return_retry_wait: Duration,
    pub register_attempts: usize,
    pub register_wait: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            return_retry_wait: Duration::from_secs(5),
            register_attempts: 3,
            register_wait: Duration::from_secs(2),
        }
    }
}

impl WorkerOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.return_retry_wait = interval;
        self
    }

    pub fn with_register_wait(mut self, wait: Duration) -> Self {
        self.register_wait = wait;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub tasks_done: usize,
    /// Stopped by the caller rather than told to finish
    pub interrupted: bool,
}

/// Register, retrying transport failures a bounded number of times.
/// A reply other than the expected success phrase is not retried.
pub fn register_with_retry<I>(
    upstream: &dyn Upstream<I>,
    secret: &Secret,
    options: &WorkerOptions,
) -> Result<ClientId, WorkerError> {
    let attempts = options.register_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match upstream.register(&secret.client_key()) {
            Ok(registration) => {
                if registration.is_accepted() && registration.message == secret.success_reply() {
                    info!(client = %registration.client, "registered with master");
                    return Ok(registration.client);
                }
                return Err(WorkerError::WrongAnswer(registration.message));
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "registration attempt failed");
                last_error = Some(e);
                if attempt < attempts {
                    std::thread::sleep(options.register_wait);
                }
            }
        }
    }

    Err(WorkerError::Connect(last_error.unwrap_or_else(|| {
        TransportError::Protocol("no registration attempt made".to_string())
    })))
}

/// Sleep for `duration`, waking early when `stop` is raised
pub(crate) fn nap(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

fn hand_back<I: Clone>(
    upstream: &dyn Upstream<I>,
    client: ClientId,
    result: TaskResult<I>,
    options: &WorkerOptions,
    stop: &AtomicBool,
) -> Result<JobStatus, WorkerError> {
    match upstream.return_result(client, result.clone()) {
        Ok(status) => Ok(status),
        Err(e) => {
            warn!(error = %e, "result hand-over failed, retrying once");
            nap(options.return_retry_wait, stop);
            upstream.return_result(client, result).map_err(WorkerError::Return)
        }
    }
}

/// Work until the master says finish, or `stop` is raised
pub fn run_worker<I: Individual>(
    upstream: &dyn Upstream<I>,
    client: ClientId,
    breeder: &dyn Breeder<I>,
    options: &WorkerOptions,
    stop: &AtomicBool,
) -> Result<WorkerReport, WorkerError> {
    let mut report = WorkerReport::default();

    loop {
        if stop.load(Ordering::SeqCst) {
            info!(tasks_done = report.tasks_done, "worker interrupted");
            report.interrupted = true;
            return Ok(report);
        }

        let mut next = match upstream.get_task(client).map_err(WorkerError::GetTask)? {
            Some(task) => {
                debug!(task = %task.id, "executing");
                let result = task.execute(client, breeder);
                report.tasks_done += 1;
                hand_back(upstream, client, result, options, stop)?
            }
            None => JobStatus::Waiting,
        };

        loop {
            match next {
                JobStatus::Continue => break,
                JobStatus::Finish => {
                    info!(tasks_done = report.tasks_done, "master says finish");
                    return Ok(report);
                }
                JobStatus::Snafu => return Err(WorkerError::Snafu),
                JobStatus::Waiting => {
                    nap(options.poll_interval, stop);
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    next = upstream.poll(client).map_err(WorkerError::Poll)?;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
