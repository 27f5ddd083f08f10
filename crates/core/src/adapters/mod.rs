// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators consumed by the core: population, breeding backend, history and snapshots

pub mod null;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

// Re-export traits
pub use traits::{
    Breeder, FamilyRecord, History, Individual, Population, SinkError, SnapshotWriter,
};

pub use null::{NullHistory, NullSnapshots};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{
    AddPath, FakeBreeder, FakeHistory, FakeSnapshots, RecordingPopulation, ScriptedUpstream,
};
