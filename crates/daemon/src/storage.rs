// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk sinks for a master run: pool snapshots and lineage history

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use brood_core::{FamilyRecord, History, SinkError, SnapshotWriter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const INITIAL_POOL_FILE: &str = "initial_pool.json";
pub const FINAL_POOL_FILE: &str = "final_pool.json";
pub const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<I> {
    pub run_id: Uuid,
    pub written_at: DateTime<Utc>,
    pub individuals: Vec<I>,
}

/// Writes ranked pools as pretty JSON into the output directory
pub struct JsonSnapshotWriter {
    dir: PathBuf,
    run_id: Uuid,
}

impl JsonSnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            dir: dir.into(),
            run_id,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn write<I: Serialize + Clone>(&self, file: &str, ranked: &[I]) -> Result<(), SinkError> {
        let snapshot = Snapshot {
            run_id: self.run_id,
            written_at: Utc::now(),
            individuals: ranked.to_vec(),
        };
        let path = self.dir.join(file);
        let tmp = path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&tmp, &path)?;
        info!(path = %path.display(), individuals = ranked.len(), "snapshot written");
        Ok(())
    }
}

impl<I: Serialize + Clone + Send + Sync> SnapshotWriter<I> for JsonSnapshotWriter {
    fn write_initial(&self, ranked: &[I]) -> Result<(), SinkError> {
        self.write(INITIAL_POOL_FILE, ranked)
    }

    fn write_final(&self, ranked: &[I]) -> Result<(), SinkError> {
        self.write(FINAL_POOL_FILE, ranked)
    }
}

/// Appends one JSON line per family record
pub struct JsonlHistory {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl JsonlHistory {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StorageError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl History for JsonlHistory {
    fn record_family(&self, record: FamilyRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
