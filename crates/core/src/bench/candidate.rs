// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::adapters::Individual;
use crate::id::IndividualId;
use serde::{Deserialize, Serialize};

/// Fitness of a candidate that has not been scored yet
pub const UNSCORED: f64 = f64::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: IndividualId,
    pub genome: Vec<f64>,
    pub fitness: f64,
}

impl Candidate {
    pub fn new(id: IndividualId, genome: Vec<f64>) -> Self {
        Self {
            id,
            genome,
            fitness: UNSCORED,
        }
    }

    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = fitness;
        self
    }

    /// All-zero template of the given dimension
    pub fn template(dimensions: usize) -> Self {
        Self::new(IndividualId(0), vec![0.0; dimensions])
    }
}

impl Individual for Candidate {
    fn id(&self) -> IndividualId {
        self.id
    }

    fn set_id(&mut self, id: IndividualId) {
        self.id = id;
    }

    fn fitness(&self) -> f64 {
        self.fitness
    }
}
