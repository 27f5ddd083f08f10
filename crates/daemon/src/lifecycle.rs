// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, periodic checks, shutdown.

use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use brood_core::bench::{Candidate, RankedPool};
use brood_core::exit;
use brood_core::job::{MasterJob, MasterSettings, NoOpJob, ProxyJob, ProxySettings};
use brood_core::worker::{register_with_retry, WorkerError, WorkerOptions};
use brood_core::{
    AnyJob, ClientId, ClientRegistry, ConfigError, Coordinator, Heartbeat, HeartbeatFailure,
    JobKind, RunConfig, SystemClock, TracedUpstream, TransportError, Upstream,
};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::RemoteMaster;
use crate::storage::{JsonSnapshotWriter, JsonlHistory, StorageError, HISTORY_FILE};

pub type DaemonCoordinator = Coordinator<Candidate, SystemClock>;

pub const LOCK_FILE: &str = "broodd.lock";

/// Daemon state during operation
pub struct Daemon {
    pub config: RunConfig,
    lock_path: PathBuf,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: TcpListener,
    pub coordinator: Arc<DaemonCoordinator>,
    /// Filled in when a proxy's upstream heartbeat gives up
    upstream_lost: Arc<Mutex<Option<HeartbeatFailure>>>,
    pub start_time: Instant,
}

impl Daemon {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Exit code once the daemon should stop, `None` while it should keep serving
    pub fn check(&self) -> Option<i32> {
        if let Some(failure) = self
            .upstream_lost
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            error!(%failure, "upstream lost, stopping");
            return Some(failure.exit_code());
        }

        match self.coordinator.job() {
            AnyJob::Proxy(proxy) if proxy.is_broken() => {
                error!("proxy job is broken, stopping");
                return Some(exit::PROXY_BROKEN);
            }
            AnyJob::NoOp(noop) if noop.reason().is_some() => {
                error!(reason = noop.reason().unwrap_or_default(), "nothing to run");
                return Some(exit::SNAFU);
            }
            _ => {}
        }

        if self.coordinator.is_everything_done() {
            info!(
                uptime_secs = self.start_time.elapsed().as_secs(),
                "job finished and all clients gone"
            );
            return Some(exit::SUCCESS);
        }
        None
    }

    /// Shutdown the daemon gracefully
    pub fn shutdown(&self) {
        info!("Shutting down daemon...");
        if self.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.lock_path) {
                warn!("Failed to remove lock file: {}", e);
            }
        }
        info!(summary = ?self.coordinator.summary(), "Daemon shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running for this output directory?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] TransportError),

    #[error("Registration with upstream failed: {0}")]
    Registration(#[from] WorkerError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl LifecycleError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::Config(_) => exit::BAD_ARGUMENTS,
            LifecycleError::Upstream(_) => exit::CONNECT_FAILED,
            LifecycleError::Registration(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// Start the daemon
pub async fn startup(config: &RunConfig) -> Result<Daemon, LifecycleError> {
    let lock_path = config.output.dir.join(LOCK_FILE);
    match startup_inner(config, &lock_path).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Leave a held lock alone; it belongs to another daemon
            if !matches!(e, LifecycleError::LockFailed(_)) && lock_path.exists() {
                let _ = std::fs::remove_file(&lock_path);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &RunConfig, lock_path: &Path) -> Result<Daemon, LifecycleError> {
    // 1. Output directory and lock file FIRST - two masters must not share a directory
    std::fs::create_dir_all(&config.output.dir)?;
    let lock_file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    {
        use std::io::Write;
        writeln!(&lock_file, "{}", std::process::id())?;
    }

    // 2. Build the job (a proxy registers with its upstream here)
    let upstream_lost = Arc::new(Mutex::new(None));
    let job = build_job(config, Arc::clone(&upstream_lost)).await?;

    // 3. Bind LAST - only after the job is ready to serve
    let listener = TcpListener::bind(&config.network.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.network.listen.clone(), e))?;

    let registry = ClientRegistry::new(SystemClock, config.timeouts, config.secret());
    let coordinator = Arc::new(Coordinator::new(job, registry, config.chunks.no_proxies));

    info!(
        kind = coordinator.job().kind_name(),
        listen = %listener.local_addr()?,
        pool_size = config.job.pool_size,
        iterations = config.job.glob_opt_iterations,
        "Daemon started"
    );

    Ok(Daemon {
        config: config.clone(),
        lock_path: lock_path.to_path_buf(),
        lock_file,
        listener,
        coordinator,
        upstream_lost,
        start_time: Instant::now(),
    })
}

async fn build_job(
    config: &RunConfig,
    upstream_lost: Arc<Mutex<Option<HeartbeatFailure>>>,
) -> Result<AnyJob<Candidate>, LifecycleError> {
    match &config.job.kind {
        JobKind::Master => build_master(config).map(AnyJob::Master),
        JobKind::Proxy => build_proxy(config, upstream_lost).await.map(AnyJob::Proxy),
        JobKind::NoOp => Ok(AnyJob::NoOp(NoOpJob::new())),
        JobKind::Unsupported(name) => Ok(AnyJob::NoOp(NoOpJob::unsupported(format!(
            "unsupported job kind '{}'",
            name
        )))),
    }
}

fn build_master(config: &RunConfig) -> Result<MasterJob<Candidate>, LifecycleError> {
    let seeds = config.load_seeds()?;
    let run_id = Uuid::new_v4();
    let dir = &config.output.dir;
    info!(%run_id, seeds = seeds.len(), output = %dir.display(), "preparing master job");

    let pool = RankedPool::new(config.job.pool_size)
        .with_acceptable_fitness(config.problem.acceptable_fitness);
    Ok(MasterJob::new(
        MasterSettings {
            pool_size: config.job.pool_size,
            glob_opt_iterations: config.job.glob_opt_iterations,
        },
        Candidate::template(config.problem.dimensions),
        seeds,
        brood_core::JobDeps {
            pool: Box::new(pool),
            history: Arc::new(JsonlHistory::open(&dir.join(HISTORY_FILE))?),
            snapshots: Arc::new(JsonSnapshotWriter::new(dir, run_id)),
        },
    ))
}

/// Connect and register with the upstream master
fn attach_upstream(
    addr: &str,
    config: &RunConfig,
) -> Result<(Arc<dyn Upstream<Candidate>>, ClientId), LifecycleError> {
    let remote = RemoteMaster::connect(addr, config.network.io_timeout)?;
    let upstream: Arc<dyn Upstream<Candidate>> = Arc::new(TracedUpstream::new(remote));
    let client = register_with_retry(upstream.as_ref(), &config.secret(), &WorkerOptions::default())?;
    Ok((upstream, client))
}

async fn build_proxy(
    config: &RunConfig,
    upstream_lost: Arc<Mutex<Option<HeartbeatFailure>>>,
) -> Result<ProxyJob<Candidate>, LifecycleError> {
    let addr = config
        .network
        .upstream
        .clone()
        .ok_or_else(|| ConfigError::Invalid {
            field: "network.upstream",
            reason: "required for a proxy".to_string(),
        })?;
    info!(upstream = %addr, "attaching to upstream master");

    let setup_config = config.clone();
    let (upstream, client) = tokio::task::spawn_blocking(move || attach_upstream(&addr, &setup_config))
        .await
        .map_err(|e| LifecycleError::Runtime(e.to_string()))??;

    let probe = Arc::clone(&upstream);
    let heartbeat = Heartbeat::start(
        config.heartbeat,
        move || probe.is_alive(client),
        move |failure| {
            error!(%failure, "upstream heartbeat failed");
            *upstream_lost.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
        },
    )?;

    let dir = &config.output.dir;
    Ok(ProxyJob::new(
        ProxySettings {
            client,
            max_tasks: config.chunks.max_tasks_per_chunk,
            max_exchange: config.chunks.max_individuals_exchanged_per_sync,
        },
        upstream,
        Box::new(RankedPool::new(config.job.pool_size)),
        Arc::new(JsonlHistory::open(&dir.join(HISTORY_FILE))?),
    )
    .with_heartbeat(heartbeat))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
