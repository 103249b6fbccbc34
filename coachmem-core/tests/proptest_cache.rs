//! Property-based tests for the cache tier.
//!
//! Uses `proptest` to verify the container's structural invariants under
//! random workloads: both budgets always hold, eviction order is strictly
//! LRU, and priority scores stay in the unit interval.

use proptest::prelude::*;

use coachmem_core::cache::container::BoundedCache;
use coachmem_core::cache::entry::{CacheEntry, CacheSource};
use coachmem_core::cache::score;
use coachmem_core::memory::{InteractionHistory, InteractionKind, MemoryPayload, MemoryRecord};
use coachmem_core::types::{Importance, MemoryType, SteamId};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_importance() -> impl Strategy<Value = Importance> {
    prop_oneof![
        Just(Importance::Critical),
        Just(Importance::High),
        Just(Importance::Medium),
        Just(Importance::Low),
        Just(Importance::Temporary),
    ]
}

fn arb_entry() -> impl Strategy<Value = CacheEntry> {
    (arb_importance(), "[a-z ]{1,200}").prop_map(|(importance, content)| {
        let record = MemoryRecord::new(
            importance,
            MemoryPayload::InteractionHistory(InteractionHistory::new(
                SteamId::new("76561198000000001"),
                InteractionKind::Advice,
                content,
            )),
        );
        CacheEntry::new(record, Duration::hours(1), CacheSource::Direct, Utc::now())
    })
}

// ---------------------------------------------------------------------------
// Property: both budgets hold after any insertion sequence
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn budgets_hold_under_random_insertions(
        entries in prop::collection::vec(arb_entry(), 1..60),
        max_entries in 1..20usize,
    ) {
        let mut cache = BoundedCache::new(
            MemoryType::InteractionHistory,
            max_entries,
            8 * 1024, // tight byte budget so both limits get exercised
        );
        for entry in entries {
            let id = entry.record.id;
            cache.put(id, entry);
            prop_assert!(cache.len() <= max_entries);
            prop_assert!(cache.bytes_used() <= 8 * 1024);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: eviction removes exactly the least-recently-used entries
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn untouched_oldest_entries_are_evicted_first(
        total in 2..40usize,
        capacity in 1..10usize,
    ) {
        prop_assume!(total > capacity);
        let mut cache = BoundedCache::new(
            MemoryType::InteractionHistory,
            capacity,
            usize::MAX, // entry cap only
        );
        let now = Utc::now();
        let mut ids = Vec::new();
        for n in 0..total {
            let record = MemoryRecord::new(
                Importance::Medium,
                MemoryPayload::InteractionHistory(InteractionHistory::new(
                    SteamId::new("76561198000000001"),
                    InteractionKind::Advice,
                    format!("advice #{n}"),
                )),
            );
            let entry = CacheEntry::new(record, Duration::hours(1), CacheSource::Direct, now);
            let id = entry.record.id;
            prop_assert!(cache.put(id, entry));
            ids.push(id);
        }
        // With no intervening reads, survivors are exactly the newest `capacity`.
        for id in &ids[..total - capacity] {
            prop_assert!(!cache.contains(id, now));
        }
        for id in &ids[total - capacity..] {
            prop_assert!(cache.contains(id, now));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: a read shields an entry from the next eviction
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reading_an_entry_moves_it_off_the_victim_slot(extra in 1..10usize) {
        let mut cache = BoundedCache::new(MemoryType::InteractionHistory, 2, usize::MAX);
        let now = Utc::now();
        let make = |n: usize| {
            let record = MemoryRecord::new(
                Importance::Medium,
                MemoryPayload::InteractionHistory(InteractionHistory::new(
                    SteamId::new("76561198000000001"),
                    InteractionKind::Advice,
                    format!("advice #{n}"),
                )),
            );
            CacheEntry::new(record, Duration::hours(1), CacheSource::Direct, now)
        };

        let first = make(0);
        let first_id = first.record.id;
        cache.put(first_id, first);
        let second = make(1);
        cache.put(second.record.id, second);

        // Touch the older entry, then overflow by one.
        prop_assert!(cache.get(&first_id, now).is_some());
        for n in 0..extra {
            let entry = make(2 + n);
            cache.put(entry.record.id, entry);
        }
        // One read shields against exactly one eviction round.
        if extra == 1 {
            prop_assert!(cache.contains(&first_id, now));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: priority scores stay in the unit interval
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn priority_is_always_in_unit_interval(
        entry in arb_entry(),
        touches in 0..500usize,
        age_hours in 0..100i64,
    ) {
        let mut entry = entry;
        let now = Utc::now();
        for _ in 0..touches {
            entry.touch(now);
        }
        let later = now + Duration::hours(age_hours);
        let p = score::priority(&entry, later);
        prop_assert!((0.0..=1.0).contains(&p), "priority {p} out of range");
    }
}
