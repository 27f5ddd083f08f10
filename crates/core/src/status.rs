// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status code returned after every client interaction

use serde::{Deserialize, Serialize};

/// What a client should do next
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Ask for more work
    Continue,
    /// Nothing to hand out right now; poll again later
    Waiting,
    /// Terminate cleanly
    Finish,
    /// Unrecoverable; abort
    Snafu,
}

impl JobStatus {
    /// Derive the status from the job's waiting/finished flags
    pub fn from_flags(waiting: bool, finished: bool) -> Self {
        match (waiting, finished) {
            (false, false) => JobStatus::Continue,
            (true, false) => JobStatus::Waiting,
            (false, true) => JobStatus::Finish,
            (true, true) => JobStatus::Snafu,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Continue => "CONTINUE",
            JobStatus::Waiting => "WAITING",
            JobStatus::Finish => "FINISH",
            JobStatus::Snafu => "SNAFU",
        };
        write!(f, "{}", s)
    }
}
