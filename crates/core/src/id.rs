// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client and individual identifiers

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Identifier handed to a client at registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub i64);

impl ClientId {
    /// Sentinel returned when registration fails
    pub const UNREGISTERED: ClientId = ClientId(-1);

    pub fn is_registered(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ClientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of an individual, equal to the ID of the task that produced it
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndividualId(pub u64);

impl IndividualId {
    /// The ID `n` places after this one
    pub fn offset(self, n: usize) -> IndividualId {
        IndividualId(self.0 + n as u64)
    }
}

impl std::fmt::Display for IndividualId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IndividualId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Monotonic client ID source. IDs start at 0 and are never reused.
#[derive(Clone, Default)]
pub struct ClientIdGen {
    next: Arc<AtomicI64>,
}

impl ClientIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ClientId {
        ClientId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Whether `id` has been handed out by this generator
    pub fn issued(&self, id: ClientId) -> bool {
        id.is_registered() && id.0 < self.next.load(Ordering::SeqCst)
    }

    /// Number of IDs issued so far
    pub fn count(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
