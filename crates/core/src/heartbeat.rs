// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness probe against an upstream
//!
//! The probe runs on its own thread. The first tick is delayed by a random
//! jitter so a restarted fleet does not hit the master in lockstep.

use crate::upstream::TransportError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(with = "humantime_serde")]
    pub period: Duration,
    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            max_jitter: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }
}

/// Why the heartbeat gave up
#[derive(Debug)]
pub enum HeartbeatFailure {
    /// The upstream answered but reported itself unhealthy
    Unhealthy,
    Transport(TransportError),
}

impl HeartbeatFailure {
    pub fn exit_code(&self) -> i32 {
        match self {
            HeartbeatFailure::Unhealthy => crate::exit::HEARTBEAT_UNHEALTHY,
            HeartbeatFailure::Transport(_) => crate::exit::HEARTBEAT_TRANSPORT,
        }
    }
}

impl std::fmt::Display for HeartbeatFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartbeatFailure::Unhealthy => write!(f, "upstream reports it is not healthy"),
            HeartbeatFailure::Transport(e) => write!(f, "heartbeat transport failure: {}", e),
        }
    }
}

type Signal = Arc<(Mutex<bool>, Condvar)>;

/// Handle to a running heartbeat thread
pub struct Heartbeat {
    stopped: Signal,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread: ThreadId,
}

impl Heartbeat {
    /// Start probing. `on_fatal` runs at most once, on the heartbeat thread,
    /// and never after [`stop`](Self::stop) returned.
    pub fn start<P, F>(config: HeartbeatConfig, mut probe: P, on_fatal: F) -> std::io::Result<Self>
    where
        P: FnMut() -> Result<bool, TransportError> + Send + 'static,
        F: FnOnce(HeartbeatFailure) + Send + 'static,
    {
        let stopped: Signal = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = stopped.clone();
        let jitter = random_jitter(config.max_jitter);

        let handle = thread::Builder::new()
            .name("brood-heartbeat".to_string())
            .spawn(move || {
                let mut delay = jitter;
                loop {
                    if wait_stopped(&signal, delay) {
                        debug!("heartbeat stopped");
                        return;
                    }
                    delay = config.period;

                    let failure = match probe() {
                        Ok(true) => {
                            debug!("upstream alive");
                            continue;
                        }
                        Ok(false) => HeartbeatFailure::Unhealthy,
                        Err(e) => HeartbeatFailure::Transport(e),
                    };

                    // A stop that raced the probe wins.
                    if is_stopped(&signal) {
                        return;
                    }
                    error!(failure = %failure, "heartbeat failed");
                    on_fatal(failure);
                    return;
                }
            })?;

        info!(
            period_ms = config.period.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "heartbeat started"
        );

        Ok(Self {
            stopped,
            thread: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Cancel the heartbeat. Safe to call repeatedly and from any thread,
    /// including the `on_fatal` callback.
    pub fn stop(&self) {
        {
            let (lock, cvar) = &*self.stopped;
            let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
            if *stopped {
                return;
            }
            *stopped = true;
            cvar.notify_all();
        }
        info!("stopping heartbeat");

        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if thread::current().id() != self.thread {
                let _ = handle.join();
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        is_stopped(&self.stopped)
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let millis = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

fn is_stopped(signal: &Signal) -> bool {
    *signal.0.lock().unwrap_or_else(|e| e.into_inner())
}

/// Wait up to `timeout`, returning true as soon as a stop is signalled
fn wait_stopped(signal: &Signal, timeout: Duration) -> bool {
    let (lock, cvar) = &**signal;
    let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
    let (guard, _) = cvar
        .wait_timeout_while(guard, timeout, |stopped| !*stopped)
        .unwrap_or_else(|e| e.into_inner());
    *guard
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
