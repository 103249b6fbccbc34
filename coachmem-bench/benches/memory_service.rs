//! Coachmem benchmark suite.
//!
//! CI-enforced performance targets:
//!   cache_store_single ............. < 50μs
//!   cache_get_hit_from_500 ......... < 50μs
//!   cache_query_tag_from_500 ....... < 2ms
//!   store_insert_single ............ < 5ms
//!   store_get_from_1000 ............ < 5ms
//!   priority_score_single .......... < 1μs

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use coachmem_core::cache::entry::{CacheEntry, CacheSource};
use coachmem_core::cache::{score, ShortTermMemory, StoreOptions};
use coachmem_core::config::CacheTiersConfig;
use coachmem_core::memory::{InteractionHistory, InteractionKind, MemoryPayload, MemoryRecord};
use coachmem_core::query::{MemoryFilters, QueryOptions};
use coachmem_core::store::LongTermStore;
use coachmem_core::types::{Importance, MemoryId, SteamId};
use chrono::{Duration, Utc};

fn make_interaction(i: u32) -> MemoryRecord {
    MemoryRecord::new(
        Importance::Medium,
        MemoryPayload::InteractionHistory(InteractionHistory::new(
            SteamId::new(format!("7656119800000{i:04}")),
            InteractionKind::Advice,
            format!("advice number {i} about holding the bombsite crossfire"),
        )),
    )
    .with_tags(vec![if i % 2 == 0 { "even" } else { "odd" }.to_string()])
}

/// Benchmark: single cache-tier store (target: < 50μs).
fn bench_cache_store(c: &mut Criterion) {
    let cache = ShortTermMemory::new(CacheTiersConfig::default());
    let mut i = 0u32;
    c.bench_function("cache_store_single", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            let record = make_interaction(black_box(i));
            let _ = cache.store(record, CacheSource::Direct, &StoreOptions::default());
        });
    });
}

/// Benchmark: cache hit among 500 resident entries (target: < 50μs).
fn bench_cache_get(c: &mut Criterion) {
    let cache = ShortTermMemory::new(CacheTiersConfig::default());
    let mut ids: Vec<MemoryId> = Vec::new();
    for i in 0..500 {
        let record = make_interaction(i);
        ids.push(record.id);
        let _ = cache.store(record, CacheSource::Direct, &StoreOptions::default());
    }
    let mut n = 0usize;
    c.bench_function("cache_get_hit_from_500", |b| {
        b.iter(|| {
            n = (n + 1) % ids.len();
            black_box(cache.get(&ids[n], None));
        });
    });
}

/// Benchmark: tag-filtered cache query over 500 entries (target: < 2ms).
fn bench_cache_query(c: &mut Criterion) {
    let cache = ShortTermMemory::new(CacheTiersConfig::default());
    for i in 0..500 {
        let _ = cache.store(make_interaction(i), CacheSource::Direct, &StoreOptions::default());
    }
    let filters = MemoryFilters {
        tags: vec!["even".to_string()],
        ..MemoryFilters::default()
    };
    let options = QueryOptions::default();
    c.bench_function("cache_query_tag_from_500", |b| {
        b.iter(|| {
            black_box(cache.query(&filters, &options));
        });
    });
}

/// Benchmark: single persistent insert (target: < 5ms).
fn bench_store_insert(c: &mut Criterion) {
    let mut store = LongTermStore::open_in_memory().expect("open");
    let mut i = 0u32;
    c.bench_function("store_insert_single", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            let record = make_interaction(black_box(i));
            store.store(&record).expect("store");
        });
    });
}

/// Benchmark: persistent point read among 1000 rows (target: < 5ms).
fn bench_store_get(c: &mut Criterion) {
    let mut store = LongTermStore::open_in_memory().expect("open");
    let mut ids: Vec<MemoryId> = Vec::new();
    for i in 0..1000 {
        let record = make_interaction(i);
        ids.push(record.id);
        store.store(&record).expect("store");
    }
    let mut n = 0usize;
    c.bench_function("store_get_from_1000", |b| {
        b.iter(|| {
            n = (n + 1) % ids.len();
            black_box(store.get(&ids[n]).expect("get"));
        });
    });
}

/// Benchmark: one priority-score computation (target: < 1μs).
fn bench_priority_score(c: &mut Criterion) {
    let now = Utc::now();
    let entry = CacheEntry::new(
        make_interaction(7),
        Duration::hours(1),
        CacheSource::Direct,
        now,
    );
    c.bench_function("priority_score_single", |b| {
        b.iter(|| {
            black_box(score::priority(black_box(&entry), now));
        });
    });
}

criterion_group!(
    benches,
    bench_cache_store,
    bench_cache_get,
    bench_cache_query,
    bench_store_insert,
    bench_store_get,
    bench_priority_score,
);
criterion_main!(benches);
