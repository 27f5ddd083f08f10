// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Each error says what went wrong, why it might have happened, and how
//! to fix it.

use std::fmt;
use std::path::Path;

use brood_core::{exit, ConfigError, HeartbeatFailure, WorkerError};

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct BroodError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Process exit code
    pub code: i32,
}

impl BroodError {
    pub fn new(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            code,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Explain a client failure against the master at `addr`
    pub fn explain(err: &ClientError, addr: &str) -> Self {
        let code = err.exit_code();
        match err {
            ClientError::Config(e) => BroodError::new(format!("Invalid run file: {}", e), code)
                .with_suggestion("Validate it first: brood check-config <run.toml>"),
            ClientError::Transport(e) if e.is_connect() => {
                BroodError::master_unreachable(addr, code).with_context(e.to_string())
            }
            ClientError::Worker(WorkerError::Connect(e)) if e.is_connect() => {
                BroodError::master_unreachable(addr, code).with_context(e.to_string())
            }
            ClientError::Worker(WorkerError::WrongAnswer(reply)) => {
                BroodError::new("The master refused to register this client", code)
                    .with_context(format!("It answered: {}", reply))
                    .with_suggestion("Use the same [auth].key as the master")
                    .with_suggestion("Or export the master's key as BROOD_KEY")
            }
            ClientError::Heartbeat(failure) => BroodError::heartbeat_lost(failure, addr, code),
            other => BroodError::new(other.to_string(), code),
        }
    }

    /// Error for a run file that does not load.
    pub fn invalid_run_file(path: &Path, err: &ConfigError) -> Self {
        let shown = path.display();
        let base = BroodError::new(format!("Invalid run file {}", shown), exit::BAD_ARGUMENTS)
            .with_context(err.to_string());
        match err {
            ConfigError::Invalid { field, .. } => base.with_suggestion(format!("Fix `{}` in {}", field, shown)),
            ConfigError::Io { .. } => base.with_suggestion("Check the path and its permissions"),
            _ => base,
        }
    }

    /// Error for when nothing answers at the master address.
    pub fn master_unreachable(addr: &str, code: i32) -> Self {
        BroodError::new(format!("Could not reach the master at {}", addr), code)
            .with_suggestion("Start it with: broodd <run.toml>")
            .with_suggestion("Point at another address with: --master host:port")
    }

    /// Error for when the heartbeat gave up on the master.
    pub fn heartbeat_lost(failure: &HeartbeatFailure, addr: &str, code: i32) -> Self {
        let err = BroodError::new(format!("Lost the master at {}", addr), code)
            .with_context(failure.to_string());
        match failure {
            HeartbeatFailure::Unhealthy => {
                err.with_suggestion("Check the master's log for the failure that stopped it")
            }
            HeartbeatFailure::Transport(_) => {
                err.with_suggestion("Check whether the master process is still running")
            }
        }
    }
}

impl fmt::Display for BroodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for BroodError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
