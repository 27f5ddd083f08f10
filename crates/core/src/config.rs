// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run configuration
//!
//! A single TOML file describes one run:
//!
//! ```toml
//! [job]
//! kind = "master"
//! pool_size = 100
//! glob_opt_iterations = 10000
//! seed_folder = "seeds"
//!
//! [timeouts]
//! contact = "30s"
//! job = "10m"
//!
//! [chunks]
//! max_tasks_per_chunk = 50
//! max_individuals_exchanged_per_sync = 10
//!
//! [problem]
//! objective = "rastrigin"
//! dimensions = 8
//! lower = -5.12
//! upper = 5.12
//! ```
//!
//! Parsing is syntactic; [`RunConfig::validate`] checks the values.

use crate::auth::Secret;
use crate::bench::Objective;
use crate::heartbeat::HeartbeatConfig;
use crate::job::JobKind;
use crate::registry::Timeouts;
use crate::task::SeedSource;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7311";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML syntax error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("seed folder {path}: {source}")]
    Seeds {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSection {
    pub kind: JobKind,
    pub pool_size: usize,
    pub glob_opt_iterations: usize,
    #[serde(default)]
    pub seed_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSection {
    pub max_tasks_per_chunk: usize,
    pub max_individuals_exchanged_per_sync: Option<usize>,
    /// Number of proxies sharing the initial generation
    pub no_proxies: usize,
}

impl Default for ChunkSection {
    fn default() -> Self {
        Self {
            max_tasks_per_chunk: 100,
            max_individuals_exchanged_per_sync: None,
            no_proxies: 1,
        }
    }
}

/// Parameters of the benchmark payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    pub objective: Objective,
    pub dimensions: usize,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub acceptable_fitness: Option<f64>,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

fn default_mutation_rate() -> f64 {
    0.1
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            objective: Objective::Sphere,
            dimensions: 4,
            lower: -5.0,
            upper: 5.0,
            acceptable_fitness: None,
            mutation_rate: default_mutation_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// Daemon log file; stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("brood-out"),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub listen: String,
    /// Master a proxy reports to
    pub upstream: Option<String>,
    /// Per-frame read/write timeout
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            upstream: None,
            io_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub job: JobSection,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub chunks: ChunkSection,
    #[serde(default)]
    pub problem: ProblemConfig,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl RunConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a run file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job.pool_size == 0 {
            return Err(ConfigError::invalid("job.pool_size", "must be at least 1"));
        }
        if self.timeouts.contact.is_zero() {
            return Err(ConfigError::invalid("timeouts.contact", "must be positive"));
        }
        if self.timeouts.job.is_zero() {
            return Err(ConfigError::invalid("timeouts.job", "must be positive"));
        }
        if self.chunks.max_tasks_per_chunk == 0 {
            return Err(ConfigError::invalid("chunks.max_tasks_per_chunk", "must be at least 1"));
        }
        if self.chunks.max_individuals_exchanged_per_sync == Some(0) {
            return Err(ConfigError::invalid(
                "chunks.max_individuals_exchanged_per_sync",
                "must be at least 1 when set",
            ));
        }
        if self.chunks.no_proxies == 0 {
            return Err(ConfigError::invalid("chunks.no_proxies", "must be at least 1"));
        }
        if self.problem.dimensions == 0 {
            return Err(ConfigError::invalid("problem.dimensions", "must be at least 1"));
        }
        if self.problem.lower.partial_cmp(&self.problem.upper) != Some(Ordering::Less) {
            return Err(ConfigError::invalid(
                "problem.lower",
                format!("{} is not below upper bound {}", self.problem.lower, self.problem.upper),
            ));
        }
        if !(0.0..=1.0).contains(&self.problem.mutation_rate) {
            return Err(ConfigError::invalid("problem.mutation_rate", "must be within [0, 1]"));
        }
        if self.job.kind == JobKind::Proxy && self.network.upstream.is_none() {
            return Err(ConfigError::invalid("network.upstream", "required for a proxy"));
        }
        if self.heartbeat.period.is_zero() {
            return Err(ConfigError::invalid("heartbeat.period", "must be positive"));
        }
        Ok(())
    }

    pub fn secret(&self) -> Secret {
        Secret::resolve(self.auth.key.as_deref())
    }

    /// Seed files from the configured folder, sorted by file name
    pub fn load_seeds(&self) -> Result<Vec<SeedSource>, ConfigError> {
        match &self.job.seed_folder {
            Some(folder) => load_seed_folder(folder),
            None => Ok(Vec::new()),
        }
    }
}

/// Read every regular file in `folder`, sorted by name
pub fn load_seed_folder(folder: &Path) -> Result<Vec<SeedSource>, ConfigError> {
    let seeds_err = |source| ConfigError::Seeds {
        path: folder.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(seeds_err)? {
        let path = entry.map_err(seeds_err)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let contents = std::fs::read_to_string(&path).map_err(seeds_err)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(SeedSource { name, contents })
        })
        .collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
