// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transferable units of work and their results
//!
//! A task carries everything a worker needs to run it without further
//! contact: the template or parents travel by value. Side effects on the
//! population only happen once the result reaches a job.

use crate::adapters::{Breeder, Individual};
use crate::id::{ClientId, IndividualId};
use serde::{Deserialize, Serialize};

/// `(mother, father, child)` triple recorded for every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub mother: Option<IndividualId>,
    pub father: Option<IndividualId>,
    pub child: IndividualId,
}

impl Lineage {
    /// Lineage of an individual created from scratch
    pub fn orphan(child: IndividualId) -> Self {
        Self {
            mother: None,
            father: None,
            child,
        }
    }
}

/// Seed file contents captured by the master at start-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSource {
    pub name: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind<I> {
    /// Create a fresh individual from the template
    Init { template: I },
    /// Populate the template from a seed file
    Seed { template: I, source: SeedSource },
    /// Breed two parents into a new individual
    Breed { mother: I, father: I },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task<I> {
    pub id: IndividualId,
    pub kind: TaskKind<I>,
}

/// Outcome of one task. `ok == false` with no value is an execution failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<I> {
    pub value: Option<I>,
    pub ok: bool,
    pub worker: ClientId,
    pub lineage: Lineage,
}

impl<I> TaskResult<I> {
    pub fn success(value: I, worker: ClientId, lineage: Lineage) -> Self {
        Self {
            value: Some(value),
            ok: true,
            worker,
            lineage,
        }
    }

    pub fn failure(worker: ClientId, lineage: Lineage) -> Self {
        Self {
            value: None,
            ok: false,
            worker,
            lineage,
        }
    }

    /// The produced individual, if the task succeeded
    pub fn accepted_value(self) -> Option<I> {
        if self.ok {
            self.value
        } else {
            None
        }
    }
}

impl<I: Individual> Task<I> {
    pub fn init(id: IndividualId, template: I) -> Self {
        Self {
            id,
            kind: TaskKind::Init { template },
        }
    }

    pub fn seed(id: IndividualId, template: I, source: SeedSource) -> Self {
        Self {
            id,
            kind: TaskKind::Seed { template, source },
        }
    }

    pub fn breed(id: IndividualId, mother: I, father: I) -> Self {
        Self {
            id,
            kind: TaskKind::Breed { mother, father },
        }
    }

    pub fn is_breed(&self) -> bool {
        matches!(self.kind, TaskKind::Breed { .. })
    }

    pub fn lineage(&self) -> Lineage {
        match &self.kind {
            TaskKind::Breed { mother, father } => Lineage {
                mother: Some(mother.id()),
                father: Some(father.id()),
                child: self.id,
            },
            TaskKind::Init { .. } | TaskKind::Seed { .. } => Lineage::orphan(self.id),
        }
    }

    /// Run the task on the calling thread
    pub fn execute(&self, worker: ClientId, breeder: &dyn Breeder<I>) -> TaskResult<I> {
        let produced = match &self.kind {
            TaskKind::Init { template } => breeder.initialize(template, self.id),
            TaskKind::Seed { template, source } => breeder.seed(template, source, self.id),
            TaskKind::Breed { mother, father } => breeder.breed(mother, father, self.id),
        };

        match produced {
            Some(mut individual) => {
                if individual.id() != self.id {
                    individual.set_id(self.id);
                }
                TaskResult::success(individual, worker, self.lineage())
            }
            None => TaskResult::failure(worker, self.lineage()),
        }
    }

    /// Synthetic failure used when the real execution never returns
    pub fn dummy_answer(&self, worker: ClientId) -> TaskResult<I> {
        TaskResult::failure(worker, self.lineage())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
