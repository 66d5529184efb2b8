// ==============================================
// END-TO-END CACHE SCENARIOS (integration)
// ==============================================
//
// Cross-module behavior of the priority LRU: eviction order across
// priority bands, callback delivery, collision pile-up, clamping, and
// the round-trip laws. Structural invariants are validated after each
// scenario via the debug validator.

use std::sync::{Arc, Mutex};

use priolru::error::CacheError;
use priolru::hash::fx_hash_key;
use priolru::policy::priority_lru::{PriorityLru, PriorityLruCore};

fn with_eviction_log(
    capacity: usize,
    max_priority: u8,
) -> (PriorityLruCore<String, i32>, Arc<Mutex<Vec<(String, i32)>>>) {
    let log: Arc<Mutex<Vec<(String, i32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let cache = PriorityLruCore::with_parts(
        capacity,
        max_priority,
        Box::new(fx_hash_key::<String>),
        Some(Box::new(move |key: &String, value: &i32| {
            sink.lock().unwrap().push((key.clone(), *value));
            true
        })),
    )
    .unwrap();
    (cache, log)
}

// ==============================================
// Eviction Delivery
// ==============================================

mod eviction_delivery {
    use super::*;

    #[test]
    fn overflow_evicts_the_oldest_and_reports_it_once() {
        let (mut cache, log) = with_eviction_log(2, 1);

        cache.add("k1".to_string(), 1, 0).unwrap();
        cache.add("k2".to_string(), 2, 0).unwrap();
        cache.add("k3".to_string(), 3, 0).unwrap();

        assert_eq!(log.lock().unwrap().as_slice(), &[("k1".to_string(), 1)]);
        assert_eq!(cache.metrics().evictions, 1);
        assert_eq!(cache.get(&"k1".to_string()).unwrap(), None);
        assert_eq!(cache.get(&"k2".to_string()).unwrap(), Some(&2));
        assert_eq!(cache.get(&"k3".to_string()).unwrap(), Some(&3));
        cache.debug_validate_invariants();
    }
}

// ==============================================
// Priority Bands
// ==============================================

mod priority_bands {
    use super::*;

    #[test]
    fn promotion_and_priority_combine_to_pick_the_victim() {
        let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(3, 2).unwrap();

        cache.add("high", 10, 2).unwrap();
        cache.add("low1", 11, 0).unwrap();
        cache.add("low2", 12, 0).unwrap();
        // Promote low1 within band 0, leaving low2 as band 0's oldest.
        cache.get(&"low1").unwrap();
        cache.add("new", 13, 1).unwrap();

        assert_eq!(cache.get(&"low2").unwrap(), None);
        assert_eq!(cache.get(&"low1").unwrap(), Some(&11));
        assert_eq!(cache.get(&"high").unwrap(), Some(&10));
        assert_eq!(cache.get(&"new").unwrap(), Some(&13));
        cache.debug_validate_invariants();
    }

    #[test]
    fn remove_oldest_drains_the_low_band_before_any_high_entry() {
        let mut cache: PriorityLruCore<String, i32> = PriorityLruCore::new(6, 1).unwrap();

        for i in 0..4 {
            cache.add(format!("hi{i}"), i, 1).unwrap();
        }
        cache.add("lo0".to_string(), 100, 0).unwrap();
        cache.add("lo1".to_string(), 101, 0).unwrap();

        assert!(cache.remove_oldest());

        // The first-inserted low-priority entry goes; every high entry stays.
        assert_eq!(cache.get(&"lo0".to_string()).unwrap(), None);
        assert_eq!(cache.get(&"lo1".to_string()).unwrap(), Some(&101));
        for i in 0..4 {
            assert_eq!(cache.get(&format!("hi{i}")).unwrap(), Some(&i));
        }
        cache.debug_validate_invariants();
    }

    #[test]
    fn requested_priority_above_the_ceiling_is_clamped() {
        let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(2, 1).unwrap();
        cache.add("k1", 1, 10).unwrap();

        assert_eq!(cache.get(&"k1").unwrap(), Some(&1));
        let (_, _, priorities) = cache.iterate();
        assert_eq!(priorities, vec![1]);
        cache.debug_validate_invariants();
    }
}

// ==============================================
// Collision Pile-Up
// ==============================================
//
// A constant hash funnels every key into one bucket chain; lookups must
// stay correct and the conflict counter must track the chain extensions.

mod collision_pile_up {
    use super::*;

    #[test]
    fn single_bucket_chain_stays_correct() {
        let mut cache: PriorityLruCore<String, i32> =
            PriorityLruCore::with_hasher(8, 1, |_key: &String| 0).unwrap();

        cache.add("k1".to_string(), 1, 0).unwrap();
        cache.add("k2".to_string(), 2, 0).unwrap();
        cache.add("k3".to_string(), 3, 0).unwrap();

        assert_eq!(cache.metrics().conflicts, 2);
        assert_eq!(cache.get(&"k1".to_string()).unwrap(), Some(&1));
        assert_eq!(cache.get(&"k2".to_string()).unwrap(), Some(&2));
        assert_eq!(cache.get(&"k3".to_string()).unwrap(), Some(&3));
        cache.debug_validate_invariants();
    }

    #[test]
    fn eviction_through_a_shared_chain_keeps_the_rest_reachable() {
        let mut cache: PriorityLruCore<String, i32> =
            PriorityLruCore::with_hasher(2, 1, |_key: &String| 0).unwrap();

        cache.add("k1".to_string(), 1, 0).unwrap();
        cache.add("k2".to_string(), 2, 0).unwrap();
        cache.add("k3".to_string(), 3, 0).unwrap(); // evicts k1 from the shared chain

        assert_eq!(cache.get(&"k1".to_string()).unwrap(), None);
        assert_eq!(cache.get(&"k2".to_string()).unwrap(), Some(&2));
        assert_eq!(cache.get(&"k3".to_string()).unwrap(), Some(&3));
        cache.debug_validate_invariants();
    }
}

// ==============================================
// Round-Trip Laws
// ==============================================

mod round_trip_laws {
    use super::*;

    #[test]
    fn add_then_get_returns_the_value() {
        let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(4, 2).unwrap();
        cache.add("k", 9, 1).unwrap();
        assert_eq!(cache.get(&"k").unwrap(), Some(&9));
    }

    #[test]
    fn add_remove_get_misses() {
        let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(4, 2).unwrap();
        cache.add("k", 9, 1).unwrap();
        assert_eq!(cache.remove(&"k").unwrap(), Some(9));
        assert_eq!(cache.get(&"k").unwrap(), None);
    }

    #[test]
    fn clear_leaves_len_zero() {
        let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(4, 2).unwrap();
        cache.add("a", 1, 0).unwrap();
        cache.add("b", 2, 2).unwrap();
        cache.clear();
        assert_eq!(cache.len(), 0);
        cache.debug_validate_invariants();
    }

    #[test]
    fn counters_never_decrease_across_a_workload() {
        let mut cache: PriorityLruCore<String, i32> = PriorityLruCore::new(4, 2).unwrap();
        let mut previous = cache.metrics();

        for i in 0..32 {
            cache.add(format!("k{}", i % 6), i, (i % 3) as u8).unwrap();
            let _ = cache.get(&format!("k{}", (i + 1) % 6));
            if i % 5 == 0 {
                let _ = cache.remove(&format!("k{}", i % 6));
            }
            let snap = cache.metrics();
            assert!(snap.inserts >= previous.inserts);
            assert!(snap.evictions >= previous.evictions);
            assert!(snap.removals >= previous.removals);
            assert!(snap.hits >= previous.hits);
            assert!(snap.misses >= previous.misses);
            assert!(snap.conflicts >= previous.conflicts);
            assert!(snap.errors >= previous.errors);
            previous = snap;
        }
        cache.debug_validate_invariants();
    }
}

// ==============================================
// Construction Edges
// ==============================================

mod construction_edges {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            PriorityLru::<String, i32>::new(0, 1).unwrap_err(),
            CacheError::CapacityTooSmall
        );
    }

    #[test]
    fn oversized_max_priority_is_clamped_and_usable() {
        let mut cache: PriorityLruCore<String, i32> = PriorityLruCore::new(5, 255).unwrap();
        cache.add("k".to_string(), 1, 200).unwrap();
        assert_eq!(cache.get(&"k".to_string()).unwrap(), Some(&1));
        cache.debug_validate_invariants();
    }

    #[test]
    fn capacity_one_with_bands_still_churns() {
        let mut cache: PriorityLruCore<String, i32> = PriorityLruCore::new(1, 3).unwrap();
        cache.add("a".to_string(), 1, 3).unwrap();
        cache.add("b".to_string(), 2, 0).unwrap(); // evicts "a" despite its band

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
        assert_eq!(cache.get(&"b".to_string()).unwrap(), Some(&2));
        cache.debug_validate_invariants();
    }
}

// ==============================================
// Mixed-Workload Invariants
// ==============================================

mod mixed_workload {
    use super::*;

    #[test]
    fn structures_stay_consistent_under_a_random_ish_sequence() {
        let mut cache: PriorityLruCore<String, usize> = PriorityLruCore::new(8, 3).unwrap();

        for round in 0..200 {
            let key = format!("k{}", round % 13);
            match round % 7 {
                0 | 1 | 2 => cache.add(key, round, (round % 4) as u8).unwrap(),
                3 => cache.add_to_back(key, round, (round % 4) as u8).unwrap(),
                4 => {
                    let _ = cache.get(&key);
                }
                5 => {
                    let _ = cache.remove(&key);
                }
                _ => {
                    let _ = cache.has(&key);
                }
            }
            assert!(cache.len() <= cache.capacity());
            cache.debug_validate_invariants();
        }
    }
}
