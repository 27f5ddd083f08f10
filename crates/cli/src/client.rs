// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master connection helpers for CLI commands

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brood_core::bench::Candidate;
use brood_core::{
    exit, worker::register_with_retry, BackendError, ClientId, ConfigError, Heartbeat, HeartbeatConfig,
    HeartbeatFailure, RunConfig, Secret, TracedUpstream, TransportError, Upstream, WorkerError,
    WorkerOptions,
};
use brood_daemon::{RemoteMaster, StorageError};
use thiserror::Error;
use tracing::{error, info};

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for each request/response exchange with the master
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("BROOD_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(30))
}

/// Sleep between polls while the master answers WAITING
pub fn poll_interval() -> Duration {
    parse_duration_ms("BROOD_POLL_INTERVAL_MS").unwrap_or(Duration::from_secs(5))
}

/// Wait between registration attempts
pub fn register_wait() -> Duration {
    parse_duration_ms("BROOD_REGISTER_WAIT_MS").unwrap_or(Duration::from_secs(2))
}

pub fn worker_options() -> WorkerOptions {
    WorkerOptions::default()
        .with_poll_interval(poll_interval())
        .with_register_wait(register_wait())
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Heartbeat(HeartbeatFailure),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("could not start the {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Process exit code, matching what the master's operators expect
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Config(_) => exit::BAD_ARGUMENTS,
            ClientError::Transport(e) if e.is_connect() => exit::CONNECT_FAILED,
            ClientError::Transport(_) => 1,
            ClientError::Worker(e) => e.exit_code(),
            ClientError::Backend(e) => e.exit_code(),
            ClientError::Heartbeat(f) => f.exit_code(),
            ClientError::Storage(_) | ClientError::Spawn { .. } => 1,
        }
    }
}

/// The `--master` flag wins over the run file's listen address
pub fn master_addr(flag: Option<&str>, config: &RunConfig) -> String {
    flag.map(str::to_string)
        .unwrap_or_else(|| config.network.listen.clone())
}

/// Connect to the master and register as a client
pub fn attach(
    addr: &str,
    secret: &Secret,
    options: &WorkerOptions,
) -> Result<(Arc<dyn Upstream<Candidate>>, ClientId), ClientError> {
    info!(master = %addr, "connecting");
    let remote = RemoteMaster::connect(addr, timeout_ipc())?;
    let upstream: Arc<dyn Upstream<Candidate>> = Arc::new(TracedUpstream::new(remote));
    let client = register_with_retry(upstream.as_ref(), secret, options)?;
    Ok((upstream, client))
}

/// Heartbeat that raises `stop` when the master goes away
pub struct Supervision {
    heartbeat: Heartbeat,
    lost: Arc<Mutex<Option<HeartbeatFailure>>>,
}

impl Supervision {
    pub fn start(
        config: HeartbeatConfig,
        upstream: Arc<dyn Upstream<Candidate>>,
        client: ClientId,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, ClientError> {
        let lost = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&lost);
        let heartbeat = Heartbeat::start(
            config,
            move || upstream.is_alive(client),
            move |failure| {
                error!(%failure, "master heartbeat failed, stopping");
                *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
                stop.store(true, Ordering::SeqCst);
            },
        )
        .map_err(|source| ClientError::Spawn {
            what: "heartbeat",
            source,
        })?;
        Ok(Self { heartbeat, lost })
    }

    /// Stop probing and report a failure seen while running, if any
    pub fn finish(self) -> Option<HeartbeatFailure> {
        self.heartbeat.stop();
        let mut lost = self.lost.lock().unwrap_or_else(|e| e.into_inner());
        lost.take()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
