// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Benchmark objectives and the breeding operators built on them

use super::candidate::Candidate;
use crate::adapters::Breeder;
use crate::config::ProblemConfig;
use crate::id::IndividualId;
use crate::task::SeedSource;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Objective function to minimise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Sphere,
    Rastrigin,
    Rosenbrock,
}

impl Objective {
    pub fn evaluate(self, genome: &[f64]) -> f64 {
        match self {
            Objective::Sphere => genome.iter().map(|x| x * x).sum(),
            Objective::Rastrigin => {
                10.0 * genome.len() as f64
                    + genome
                        .iter()
                        .map(|x| x * x - 10.0 * (2.0 * PI * x).cos())
                        .sum::<f64>()
            }
            Objective::Rosenbrock => genome
                .windows(2)
                .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
                .sum(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Plain(Vec<f64>),
    Tagged { genome: Vec<f64> },
}

/// Random init, arithmetic crossover and uniform mutation within bounds
#[derive(Debug, Clone)]
pub struct BenchBackend {
    objective: Objective,
    lower: f64,
    upper: f64,
    mutation_rate: f64,
}

impl BenchBackend {
    pub fn new(objective: Objective, lower: f64, upper: f64) -> Self {
        let (lower, upper) = if lower <= upper {
            (lower, upper)
        } else {
            (upper, lower)
        };
        Self {
            objective,
            lower,
            upper,
            mutation_rate: 0.1,
        }
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn from_problem(problem: &ProblemConfig) -> Self {
        Self::new(problem.objective, problem.lower, problem.upper)
            .with_mutation_rate(problem.mutation_rate)
    }

    fn scored(&self, id: IndividualId, genome: Vec<f64>) -> Candidate {
        let fitness = self.objective.evaluate(&genome);
        Candidate::new(id, genome).with_fitness(fitness)
    }
}

impl Breeder<Candidate> for BenchBackend {
    fn initialize(&self, template: &Candidate, id: IndividualId) -> Option<Candidate> {
        let mut rng = rand::thread_rng();
        let genome = (0..template.genome.len())
            .map(|_| rng.gen_range(self.lower..=self.upper))
            .collect();
        Some(self.scored(id, genome))
    }

    fn seed(&self, template: &Candidate, source: &SeedSource, id: IndividualId) -> Option<Candidate> {
        let genome = match serde_json::from_str::<SeedFile>(&source.contents) {
            Ok(SeedFile::Plain(genome)) | Ok(SeedFile::Tagged { genome }) => genome,
            Err(e) => {
                tracing::warn!(seed = %source.name, error = %e, "unreadable seed file");
                return None;
            }
        };
        if genome.len() != template.genome.len() {
            tracing::warn!(
                seed = %source.name,
                expected = template.genome.len(),
                got = genome.len(),
                "seed dimension mismatch"
            );
            return None;
        }
        Some(self.scored(id, genome))
    }

    fn breed(&self, mother: &Candidate, father: &Candidate, id: IndividualId) -> Option<Candidate> {
        if mother.genome.len() != father.genome.len() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let span = self.upper - self.lower;
        let genome = mother
            .genome
            .iter()
            .zip(&father.genome)
            .map(|(m, f)| {
                let alpha: f64 = rng.gen();
                let mut gene = alpha * m + (1.0 - alpha) * f;
                if rng.gen_bool(self.mutation_rate) {
                    gene += rng.gen_range(-0.1..=0.1) * span;
                }
                gene.clamp(self.lower, self.upper)
            })
            .collect();
        Some(self.scored(id, genome))
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
