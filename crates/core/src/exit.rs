// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process exit codes shared by the worker, threaded backend and daemons

pub const SUCCESS: i32 = 0;
pub const BAD_ARGUMENTS: i32 = 2;
/// Registration answered with something other than the success phrase
pub const WRONG_ANSWER: i32 = 27;
pub const CONNECT_FAILED: i32 = 42;
/// Upstream answered SNAFU
pub const SNAFU: i32 = 33;
pub const GET_TASK_FAILED: i32 = 11;
pub const RETURN_FAILED: i32 = 9;
pub const POLL_FAILED: i32 = 8;
pub const HEARTBEAT_UNHEALTHY: i32 = 99;
pub const HEARTBEAT_TRANSPORT: i32 = 45;
pub const PROXY_BROKEN: i32 = 97;
