// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bench::Candidate;

fn scored(id: u64, fitness: f64) -> Candidate {
    Candidate::new(IndividualId(id), vec![]).with_fitness(fitness)
}

fn ids(pool: &RankedPool<Candidate>) -> Vec<u64> {
    pool.ranked(usize::MAX).iter().map(|c| c.id.0).collect()
}

#[test]
fn competitive_add_keeps_best_within_capacity() {
    let pool = RankedPool::new(2);
    assert!(pool.add(scored(1, 5.0)));
    assert!(pool.add(scored(2, 3.0)));
    assert!(!pool.add(scored(3, 9.0)));
    assert!(pool.add(scored(4, 1.0)));

    assert_eq!(ids(&pool), vec![4, 2]);
}

#[test]
fn forced_add_evicts_worst_even_when_new_is_worse() {
    let pool = RankedPool::new(2);
    pool.add_forced(scored(1, 1.0));
    pool.add_forced(scored(2, 2.0));
    pool.add_forced(scored(3, 10.0));

    assert_eq!(ids(&pool), vec![1, 3]);
}

#[test]
fn forced_add_replaces_same_id() {
    let pool = RankedPool::new(4);
    pool.add_forced(scored(1, 5.0));
    pool.add_forced(scored(1, 2.0));

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.best().unwrap().fitness, 2.0);
}

#[test]
fn checked_add_rejects_known_ids() {
    let pool = RankedPool::new(4);
    pool.add_forced(scored(7, 5.0));

    assert!(!pool.add_checked(scored(7, 0.1)));
    assert!(pool.add_checked(scored(8, 0.1)));
    assert_eq!(ids(&pool), vec![8, 7]);
}

#[test]
fn take_best_since_skips_older_ids() {
    let pool = RankedPool::new(5);
    pool.add(scored(1, 0.5));
    pool.add(scored(10, 1.0));
    pool.add(scored(11, 2.0));
    pool.add(scored(12, 3.0));

    let taken = pool.take_best_since(IndividualId(10), 2);

    assert_eq!(taken.iter().map(|c| c.id.0).collect::<Vec<_>>(), vec![10, 11]);
    assert_eq!(ids(&pool), vec![1, 12]);
}

#[test]
fn parents_are_distinct_when_possible() {
    let pool = RankedPool::new(3);
    assert!(pool.parents().is_none());

    pool.add(scored(1, 1.0));
    let (m, f) = pool.parents().unwrap();
    assert_eq!(m.id, f.id);

    pool.add(scored(2, 2.0));
    for _ in 0..20 {
        let (m, f) = pool.parents().unwrap();
        assert_ne!(m.id, f.id);
    }
}

#[test]
fn acceptable_fitness_uses_best_entry() {
    let pool = RankedPool::new(3).with_acceptable_fitness(Some(0.01));
    pool.add(scored(1, 1.0));
    assert!(!pool.acceptable_fitness_reached());
    pool.add(scored(2, 0.001));
    assert!(pool.acceptable_fitness_reached());
}

#[test]
fn replace_all_truncates_to_capacity() {
    let pool = RankedPool::new(2);
    pool.replace_all(vec![scored(1, 3.0), scored(2, 1.0), scored(3, 2.0)]);
    assert_eq!(ids(&pool), vec![2, 3]);
}

#[test]
fn non_finite_fitness_sinks_to_the_bottom() {
    let pool = RankedPool::new(3).with_acceptable_fitness(Some(1.0));
    pool.add(scored(1, 4.0));
    pool.add(scored(2, f64::NAN));
    pool.add(scored(3, f64::NEG_INFINITY));
    pool.add(scored(4, 2.0));

    assert_eq!(ids(&pool)[..2], [4, 1]);
    assert_eq!(pool.best().map(|c| c.id.0), Some(4));
    assert!(!pool.acceptable_fitness_reached());
}

#[test]
fn finite_candidate_displaces_a_nan_when_full() {
    let pool = RankedPool::new(2);
    pool.add(scored(1, 3.0));
    pool.add(scored(2, f64::NAN));

    assert!(pool.add(scored(3, 8.0)));
    assert!(!pool.add(scored(4, f64::NAN)));
    assert_eq!(ids(&pool), vec![1, 3]);
}
