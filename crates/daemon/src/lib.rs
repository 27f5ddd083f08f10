// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! brood-daemon: serves a master or proxy job over TCP
//!
//! The library half holds the wire protocol, the blocking client used by
//! workers and proxies, and the daemon lifecycle; `broodd` wires them up.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod storage;

pub use client::RemoteMaster;
pub use lifecycle::{startup, Daemon, DaemonCoordinator, LifecycleError};
pub use protocol::{ProtocolError, Request, Response, PROTOCOL_VERSION};
pub use storage::{JsonSnapshotWriter, JsonlHistory, StorageError};
