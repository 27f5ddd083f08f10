// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory population sorted by fitness

use crate::adapters::{Individual, Population};
use crate::id::IndividualId;
use rand::Rng;
use std::sync::Mutex;

pub struct RankedPool<I> {
    capacity: usize,
    acceptable_fitness: Option<f64>,
    // Best first
    entries: Mutex<Vec<I>>,
}

impl<I: Individual> RankedPool<I> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            acceptable_fitness: None,
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Stop the run once the best fitness drops to `threshold` or below
    pub fn with_acceptable_fitness(mut self, threshold: Option<f64>) -> Self {
        self.acceptable_fitness = threshold;
        self
    }

    pub fn best(&self) -> Option<I> {
        self.lock().first().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<I>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_sorted(entries: &mut Vec<I>, individual: I) {
        let fitness = rank(&individual);
        let at = entries.partition_point(|e| rank(e) <= fitness);
        entries.insert(at, individual);
    }

    fn insert_competitive(&self, entries: &mut Vec<I>, individual: I) -> bool {
        if entries.len() < self.capacity {
            Self::insert_sorted(entries, individual);
            return true;
        }
        match entries.last() {
            Some(worst) if rank(&individual) < rank(worst) => {
                entries.pop();
                Self::insert_sorted(entries, individual);
                true
            }
            _ => false,
        }
    }
}

/// Sort key; non-finite fitness ranks below every finite one
fn rank<I: Individual>(individual: &I) -> f64 {
    let fitness = individual.fitness();
    if fitness.is_finite() {
        fitness
    } else {
        f64::INFINITY
    }
}

impl<I: Individual> Population<I> for RankedPool<I> {
    fn add(&self, individual: I) -> bool {
        let mut entries = self.lock();
        self.insert_competitive(&mut entries, individual)
    }

    fn add_forced(&self, individual: I) {
        let mut entries = self.lock();
        let id = individual.id();
        entries.retain(|e| e.id() != id);
        if entries.len() >= self.capacity {
            entries.pop();
        }
        Self::insert_sorted(&mut entries, individual);
    }

    fn add_checked(&self, individual: I) -> bool {
        let mut entries = self.lock();
        let id = individual.id();
        if entries.iter().any(|e| e.id() == id) {
            return false;
        }
        self.insert_competitive(&mut entries, individual)
    }

    fn parents(&self) -> Option<(I, I)> {
        let entries = self.lock();
        match entries.len() {
            0 => None,
            1 => Some((entries[0].clone(), entries[0].clone())),
            n => {
                let mut rng = rand::thread_rng();
                let mother = rng.gen_range(0..n);
                let mut father = rng.gen_range(0..n - 1);
                if father >= mother {
                    father += 1;
                }
                Some((entries[mother].clone(), entries[father].clone()))
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn acceptable_fitness_reached(&self) -> bool {
        match (self.acceptable_fitness, self.lock().first()) {
            (Some(threshold), Some(best)) => best.fitness().is_finite() && best.fitness() <= threshold,
            _ => false,
        }
    }

    fn ranked(&self, limit: usize) -> Vec<I> {
        self.lock().iter().take(limit).cloned().collect()
    }

    fn take_best_since(&self, since: IndividualId, limit: usize) -> Vec<I> {
        let mut entries = self.lock();
        let mut taken = Vec::new();
        let mut i = 0;
        while i < entries.len() && taken.len() < limit {
            if entries[i].id() >= since {
                taken.push(entries.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    fn replace_all(&self, individuals: Vec<I>) {
        let mut entries = self.lock();
        entries.clear();
        for individual in individuals {
            Self::insert_sorted(&mut entries, individual);
        }
        entries.truncate(self.capacity);
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
