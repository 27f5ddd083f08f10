// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;

#[test]
fn client_ids_start_at_zero_and_increase() {
    let ids = ClientIdGen::new();
    assert_eq!(ids.next(), ClientId(0));
    assert_eq!(ids.next(), ClientId(1));
    assert_eq!(ids.next(), ClientId(2));
}

#[test]
fn issued_rejects_sentinel_and_future_ids() {
    let ids = ClientIdGen::new();
    let first = ids.next();
    assert!(ids.issued(first));
    assert!(!ids.issued(ClientId::UNREGISTERED));
    assert!(!ids.issued(ClientId(1)));
}

#[test]
fn generator_clones_share_the_counter() {
    let a = ClientIdGen::new();
    let b = a.clone();
    assert_eq!(a.next(), ClientId(0));
    assert_eq!(b.next(), ClientId(1));
    assert_eq!(a.count(), 2);
}

#[test]
fn individual_offset_adds_positions() {
    assert_eq!(IndividualId(10).offset(5), IndividualId(15));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Concurrent registrations never collide and leave no gaps.
    #[test]
    fn concurrent_ids_are_unique_and_dense(threads in 1usize..8, per_thread in 1usize..64) {
        let ids = ClientIdGen::new();
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..per_thread).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                prop_assert!(seen.insert(id));
            }
        }

        let total = (threads * per_thread) as i64;
        prop_assert_eq!(seen.len() as i64, total);
        prop_assert!(seen.iter().all(|id| id.0 >= 0 && id.0 < total));
    }
}
