// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator trait definitions

use crate::id::IndividualId;
use crate::task::{Lineage, SeedSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Individual
// =============================================================================

/// One candidate solution. Lower fitness is better.
pub trait Individual:
    Clone + std::fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    fn id(&self) -> IndividualId;
    fn set_id(&mut self, id: IndividualId);
    fn fitness(&self) -> f64;
}

// =============================================================================
// Population
// =============================================================================

/// The shared, ranked population.
///
/// Implementations synchronize internally; every method takes `&self`.
/// Callers that need read-then-decide-then-write sequences serialize them
/// behind their own pool lock.
pub trait Population<I>: Send + Sync {
    /// Competitive insert; returns whether the individual was accepted
    fn add(&self, individual: I) -> bool;

    /// Unconditional insert, evicting the worst entry when full
    fn add_forced(&self, individual: I);

    /// Competitive insert that first rejects IDs already present
    fn add_checked(&self, individual: I) -> bool;

    /// Two parents for the next breeding attempt, `None` when empty
    fn parents(&self) -> Option<(I, I)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of individuals held
    fn capacity(&self) -> usize;

    /// Early-exit predicate evaluated after results land
    fn acceptable_fitness_reached(&self) -> bool;

    /// Up to `limit` individuals in rank order (best first)
    fn ranked(&self, limit: usize) -> Vec<I>;

    /// Remove and return up to `limit` of the best individuals with `id >= since`
    fn take_best_since(&self, since: IndividualId, limit: usize) -> Vec<I>;

    /// Drop everything and insert `individuals` unconditionally
    fn replace_all(&self, individuals: Vec<I>);
}

// =============================================================================
// Breeder
// =============================================================================

/// The optimization payload invoked from inside `Task::execute`.
///
/// Returning `None` marks an execution failure.
pub trait Breeder<I>: Send + Sync {
    fn initialize(&self, template: &I, id: IndividualId) -> Option<I>;
    fn seed(&self, template: &I, source: &SeedSource, id: IndividualId) -> Option<I>;
    fn breed(&self, mother: &I, father: &I, id: IndividualId) -> Option<I>;
}

// =============================================================================
// Sinks
// =============================================================================

/// Errors from history and snapshot sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// One breeding attempt, successful or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub mother: Option<IndividualId>,
    pub father: Option<IndividualId>,
    pub child: IndividualId,
    pub accepted: bool,
    pub was_null: bool,
}

impl FamilyRecord {
    pub fn from_lineage(lineage: &Lineage, accepted: bool, was_null: bool) -> Self {
        Self {
            mother: lineage.mother,
            father: lineage.father,
            child: lineage.child,
            accepted,
            was_null,
        }
    }
}

/// Append-only lineage history
pub trait History: Send + Sync {
    fn record_family(&self, record: FamilyRecord) -> Result<(), SinkError>;
}

/// Persists the population at the init→opt transition and at completion
pub trait SnapshotWriter<I>: Send + Sync {
    fn write_initial(&self, ranked: &[I]) -> Result<(), SinkError>;
    fn write_final(&self, ranked: &[I]) -> Result<(), SinkError>;
}

impl<I, P: Population<I> + ?Sized> Population<I> for std::sync::Arc<P> {
    fn add(&self, individual: I) -> bool {
        (**self).add(individual)
    }

    fn add_forced(&self, individual: I) {
        (**self).add_forced(individual)
    }

    fn add_checked(&self, individual: I) -> bool {
        (**self).add_checked(individual)
    }

    fn parents(&self) -> Option<(I, I)> {
        (**self).parents()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn acceptable_fitness_reached(&self) -> bool {
        (**self).acceptable_fitness_reached()
    }

    fn ranked(&self, limit: usize) -> Vec<I> {
        (**self).ranked(limit)
    }

    fn take_best_since(&self, since: IndividualId, limit: usize) -> Vec<I> {
        (**self).take_best_since(since, limit)
    }

    fn replace_all(&self, individuals: Vec<I>) {
        (**self).replace_all(individuals)
    }
}
