// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sinks that discard everything, for nodes that do not persist

use super::traits::{FamilyRecord, History, SinkError, SnapshotWriter};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullHistory;

impl History for NullHistory {
    fn record_family(&self, _record: FamilyRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSnapshots;

impl<I> SnapshotWriter<I> for NullSnapshots {
    fn write_initial(&self, _ranked: &[I]) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_final(&self, _ranked: &[I]) -> Result<(), SinkError> {
        Ok(())
    }
}
