//! Short-term memory — the cache tier.
//!
//! [`ShortTermMemory`] coordinates one [`BoundedCache`] per memory type plus
//! the three secondary indexes. Each container sits behind its own lock —
//! the types already own independent containers, so per-type locking is the
//! natural sharding unit and foreground operations on different types never
//! contend.

pub mod container;
pub mod entry;
pub mod index;
pub mod score;

pub use container::{BoundedCache, CacheStats};
pub use entry::{CacheEntry, CacheSource};
pub use index::{CacheIndexes, ContextIndexEntry, PlayerIndexEntry, SessionIndexEntry};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::time::Instant;
use tracing::debug;

use crate::config::CacheTiersConfig;
use crate::error::{CoachMemError, Result};
use crate::memory::{MemoryRecord, MemoryUpdate};
use crate::query::{sort_records, MemoryFilters, QueryOptions, QueryResult, SortBy, SortOrder};
use crate::types::{MemoryId, MemoryType, SessionId, SteamId};

/// Options for a cache-tier store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Run one cleanup pass and retry when the first put fails.
    pub force_eviction: bool,
    /// Register the record in the secondary indexes.
    pub update_indexes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            force_eviction: true,
            update_indexes: true,
        }
    }
}

/// Aggregate statistics across all five containers.
#[derive(Debug, Clone)]
pub struct ShortTermStats {
    /// Per-container snapshots.
    pub per_type: Vec<CacheStats>,
    /// Entries across all containers.
    pub total_entries: usize,
    /// Bytes across all containers.
    pub total_bytes: usize,
    /// Aggregate hit rate in [0, 1].
    pub hit_rate: f64,
}

/// One container per memory type, each behind its own lock.
struct TypedCaches {
    profiles: Mutex<BoundedCache>,
    interactions: Mutex<BoundedCache>,
    knowledge: Mutex<BoundedCache>,
    sessions: Mutex<BoundedCache>,
    insights: Mutex<BoundedCache>,
}

impl TypedCaches {
    fn new(tiers: &CacheTiersConfig) -> Self {
        let make = |ty: MemoryType| {
            let tier = tiers.for_type(ty);
            Mutex::new(BoundedCache::new(ty, tier.max_entries, tier.max_bytes()))
        };
        Self {
            profiles: make(MemoryType::PlayerProfile),
            interactions: make(MemoryType::InteractionHistory),
            knowledge: make(MemoryType::GameKnowledge),
            sessions: make(MemoryType::SessionData),
            insights: make(MemoryType::CoachingInsights),
        }
    }

    fn for_type(&self, ty: MemoryType) -> &Mutex<BoundedCache> {
        match ty {
            MemoryType::PlayerProfile => &self.profiles,
            MemoryType::InteractionHistory => &self.interactions,
            MemoryType::GameKnowledge => &self.knowledge,
            MemoryType::SessionData => &self.sessions,
            MemoryType::CoachingInsights => &self.insights,
        }
    }
}

/// The short-term coordinator: five bounded containers + three indexes.
pub struct ShortTermMemory {
    caches: TypedCaches,
    indexes: Mutex<CacheIndexes>,
    tiers: CacheTiersConfig,
}

impl ShortTermMemory {
    /// Create the coordinator from per-type tier limits.
    #[must_use]
    pub fn new(tiers: CacheTiersConfig) -> Self {
        Self {
            caches: TypedCaches::new(&tiers),
            indexes: Mutex::new(CacheIndexes::new()),
            tiers,
        }
    }

    /// Cache a record. Expiry is the record's own, falling back to the
    /// type-default TTL. On capacity failure, runs one cleanup pass and
    /// retries once before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] on a malformed payload or
    /// [`CoachMemError::CapacityExceeded`] when the entry cannot fit.
    pub fn store(
        &self,
        record: MemoryRecord,
        source: CacheSource,
        options: &StoreOptions,
    ) -> Result<()> {
        record.validate()?;
        let ty = record.memory_type();
        let tier = self.tiers.for_type(ty);
        let ttl = Duration::seconds(tier.default_ttl_secs as i64);
        let now = Utc::now();
        let entry = CacheEntry::new(record, ttl, source, now);
        let id = entry.record.id;
        let size = entry.size_bytes;

        let (stored, dropped) = {
            let mut cache = self.caches.for_type(ty).lock();
            let stored = if cache.put(id, entry.clone()) {
                true
            } else if options.force_eviction {
                cache.cleanup(now);
                cache.put(id, entry.clone())
            } else {
                false
            };
            (stored, cache.take_dropped())
        };
        if !dropped.is_empty() {
            let mut indexes = self.indexes.lock();
            for victim in &dropped {
                indexes.remove_id(victim);
            }
        }
        if !stored {
            return Err(CoachMemError::CapacityExceeded {
                memory_type: ty,
                limit_bytes: tier.max_bytes(),
                entry_bytes: size,
            });
        }

        if options.update_indexes {
            self.indexes.lock().note_stored(&entry.record, size, now);
        }
        debug!(%id, memory_type = %ty, bytes = size, "cached record");
        Ok(())
    }

    /// Look up a record. With a type hint this is one container probe;
    /// without, all five are probed in the fixed type order and the first
    /// match wins.
    #[must_use]
    pub fn get(&self, id: &MemoryId, hint: Option<MemoryType>) -> Option<MemoryRecord> {
        let now = Utc::now();
        let types: &[MemoryType] = match hint {
            Some(ref ty) => std::slice::from_ref(ty),
            None => &MemoryType::ALL,
        };
        let mut entry = None;
        let mut dropped = Vec::new();
        for ty in types {
            let mut cache = self.caches.for_type(*ty).lock();
            let found = cache.get(id, now);
            dropped.extend(cache.take_dropped());
            if found.is_some() {
                entry = found;
                break;
            }
        }
        if !dropped.is_empty() || entry.is_some() {
            let mut indexes = self.indexes.lock();
            for expired in &dropped {
                indexes.remove_id(expired);
            }
            if let Some(ref entry) = entry {
                indexes.note_access(&entry.record, now);
            }
        }
        entry.map(|e| e.record)
    }

    /// Whether an unexpired cached copy exists, without promoting it.
    #[must_use]
    pub fn contains(&self, id: &MemoryId, hint: Option<MemoryType>) -> bool {
        let now = Utc::now();
        match hint {
            Some(ty) => self.caches.for_type(ty).lock().contains(id, now),
            None => MemoryType::ALL
                .iter()
                .any(|ty| self.caches.for_type(*ty).lock().contains(id, now)),
        }
    }

    /// Read-merge-write a partial update into the cached copy. Returns
    /// `Ok(false)` if no cached copy exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the patch is invalid for
    /// the cached record.
    pub fn update(
        &self,
        id: &MemoryId,
        patch: &MemoryUpdate,
        hint: Option<MemoryType>,
    ) -> Result<bool> {
        let now = Utc::now();
        let types: &[MemoryType] = match hint {
            Some(ref ty) => std::slice::from_ref(ty),
            None => &MemoryType::ALL,
        };
        for ty in types {
            let updated_entry = {
                let mut cache = self.caches.for_type(*ty).lock();
                if !cache.contains(id, now) {
                    continue;
                }
                let mut apply_result = Ok(());
                cache.mutate(id, now, |entry| {
                    apply_result = entry.record.apply_update(patch);
                });
                apply_result?;
                cache.peek(id, now)
            };
            if let Some(entry) = updated_entry {
                // Tags or payload may have moved the record between owners.
                self.indexes
                    .lock()
                    .note_stored(&entry.record, entry.size_bytes, now);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete a record from the containers and scrub it from every index.
    pub fn remove(&self, id: &MemoryId, hint: Option<MemoryType>) -> bool {
        let types: &[MemoryType] = match hint {
            Some(ref ty) => std::slice::from_ref(ty),
            None => &MemoryType::ALL,
        };
        let mut removed = false;
        for ty in types {
            removed |= self.caches.for_type(*ty).lock().remove(id).is_some();
        }
        self.indexes.lock().remove_id(id);
        removed
    }

    /// Scan the relevant container(s), filter, sort, and paginate.
    #[must_use]
    pub fn query(&self, filters: &MemoryFilters, options: &QueryOptions) -> QueryResult {
        let start = Instant::now();
        let now = Utc::now();
        let types: &[MemoryType] = match filters.memory_type {
            Some(ref ty) => std::slice::from_ref(ty),
            None => &MemoryType::ALL,
        };

        let mut matched: Vec<CacheEntry> = Vec::new();
        for ty in types {
            let cache = self.caches.for_type(*ty).lock();
            matched.extend(
                cache.entries_where(|e| filters.matches(&e.record, now, options.include_expired)),
            );
        }
        let total_count = matched.len();

        let entries: Vec<MemoryRecord> = if options.sort_by == SortBy::Priority {
            matched.sort_by(|a, b| {
                let ord = score::priority_score(a, now).cmp(&score::priority_score(b, now));
                match options.sort_order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
            matched
                .into_iter()
                .skip(options.offset)
                .take(options.limit)
                .map(|e| e.record)
                .collect()
        } else {
            let mut records: Vec<MemoryRecord> = matched.into_iter().map(|e| e.record).collect();
            sort_records(&mut records, options.sort_by, options.sort_order);
            records
                .into_iter()
                .skip(options.offset)
                .take(options.limit)
                .collect()
        };

        let returned = entries.len();
        QueryResult {
            entries,
            total_count,
            has_more: options.offset + returned < total_count,
            search_time_ms: start.elapsed().as_millis() as u64,
            from_cache: true,
        }
    }

    /// Sweep expired entries from all containers, scrub them from the
    /// indexes, then purge stale index owners. Returns entries removed.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        for ty in MemoryType::ALL {
            let expired: Vec<MemoryId> = {
                let cache = self.caches.for_type(ty).lock();
                cache
                    .entries_where(|e| e.is_expired(now))
                    .into_iter()
                    .map(|e| e.record.id)
                    .collect()
            };
            for id in expired {
                self.caches.for_type(ty).lock().remove(&id);
                self.indexes.lock().remove_id(&id);
                removed += 1;
            }
        }
        let pruned = self.indexes.lock().prune_stale(now);
        if removed > 0 || pruned > 0 {
            debug!(removed, pruned, "short-term cleanup");
        }
        removed
    }

    /// Drop every cached entry and index.
    pub fn clear(&self) {
        for ty in MemoryType::ALL {
            self.caches.for_type(ty).lock().clear();
        }
        *self.indexes.lock() = CacheIndexes::new();
    }

    /// Aggregate statistics, recomputed on demand.
    #[must_use]
    pub fn stats(&self) -> ShortTermStats {
        let now = Utc::now();
        let per_type: Vec<CacheStats> = MemoryType::ALL
            .iter()
            .map(|ty| self.caches.for_type(*ty).lock().stats(now))
            .collect();
        let total_entries = per_type.iter().map(|s| s.entry_count).sum();
        let total_bytes = per_type.iter().map(|s| s.bytes_used).sum();
        let hits: u64 = per_type.iter().map(|s| s.hits).sum();
        let misses: u64 = per_type.iter().map(|s| s.misses).sum();
        let lookups = hits + misses;
        ShortTermStats {
            per_type,
            total_entries,
            total_bytes,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Snapshot a player's index view.
    #[must_use]
    pub fn player_view(&self, steam_id: &SteamId) -> Option<PlayerIndexEntry> {
        self.indexes.lock().player(steam_id).cloned()
    }

    /// Snapshot a session's index view.
    #[must_use]
    pub fn session_view(&self, session_id: &SessionId) -> Option<SessionIndexEntry> {
        self.indexes.lock().session(session_id).cloned()
    }

    /// Snapshot a context key's index view.
    #[must_use]
    pub fn context_view(&self, key: &str) -> Option<ContextIndexEntry> {
        self.indexes.lock().context(key).cloned()
    }

    /// Whether any index still references `id` (test hook for remove).
    #[must_use]
    pub fn index_references(&self, id: &MemoryId) -> bool {
        self.indexes.lock().references(id)
    }
}

impl std::fmt::Debug for ShortTermMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ShortTermMemory")
            .field("total_entries", &stats.total_entries)
            .field("total_bytes", &stats.total_bytes)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        InteractionHistory, InteractionKind, MemoryPayload, PlayerProfile, SessionData,
    };
    use crate::types::Importance;
    use chrono::Duration as ChronoDuration;

    fn steam() -> SteamId {
        SteamId::new("76561198000000001")
    }

    fn coordinator() -> ShortTermMemory {
        ShortTermMemory::new(CacheTiersConfig::default())
    }

    fn profile() -> MemoryRecord {
        MemoryRecord::new(
            Importance::High,
            MemoryPayload::PlayerProfile(PlayerProfile::new(steam(), "player_one")),
        )
    }

    fn interaction(n: u32) -> MemoryRecord {
        MemoryRecord::new(
            Importance::Low,
            MemoryPayload::InteractionHistory(InteractionHistory::new(
                steam(),
                InteractionKind::Advice,
                format!("advice #{n}"),
            )),
        )
        .with_tags(vec!["advice".to_string()])
    }

    #[test]
    fn store_then_get_without_hint() {
        let stm = coordinator();
        let record = profile();
        let id = record.id;
        stm.store(record.clone(), CacheSource::Direct, &StoreOptions::default())
            .expect("store");

        let found = stm.get(&id, None).expect("probe order finds it");
        assert_eq!(found.id, id);
        let found = stm.get(&id, Some(MemoryType::PlayerProfile)).expect("hinted");
        assert_eq!(found.id, id);
        assert!(stm.get(&id, Some(MemoryType::GameKnowledge)).is_none());
    }

    #[test]
    fn store_updates_player_index() {
        let stm = coordinator();
        let record = profile();
        let id = record.id;
        stm.store(record, CacheSource::Direct, &StoreOptions::default())
            .expect("store");

        let view = stm.player_view(&steam()).expect("indexed");
        assert_eq!(view.profile_id, Some(id));
    }

    #[test]
    fn store_without_index_update_skips_indexes() {
        let stm = coordinator();
        let options = StoreOptions {
            update_indexes: false,
            ..StoreOptions::default()
        };
        stm.store(profile(), CacheSource::Direct, &options)
            .expect("store");
        assert!(stm.player_view(&steam()).is_none());
    }

    #[test]
    fn update_merges_into_cached_copy() {
        let stm = coordinator();
        let record = profile();
        let id = record.id;
        stm.store(record, CacheSource::Direct, &StoreOptions::default())
            .expect("store");

        let patch = MemoryUpdate {
            importance: Some(Importance::Critical),
            ..MemoryUpdate::default()
        };
        assert!(stm.update(&id, &patch, None).expect("update"));
        let found = stm.get(&id, None).expect("get");
        assert_eq!(found.importance, Importance::Critical);

        let absent = MemoryId::new();
        assert!(!stm.update(&absent, &patch, None).expect("absent"));
    }

    #[test]
    fn remove_scrubs_all_indexes() {
        let stm = coordinator();
        let record = interaction(1);
        let id = record.id;
        stm.store(record, CacheSource::Direct, &StoreOptions::default())
            .expect("store");
        assert!(stm.index_references(&id));

        assert!(stm.remove(&id, None));
        assert!(stm.get(&id, None).is_none());
        assert!(!stm.index_references(&id));
        assert!(!stm.remove(&id, None), "second remove is a no-op");
    }

    #[test]
    fn eviction_scrubs_the_victim_from_the_indexes() {
        let mut tiers = CacheTiersConfig::default();
        tiers.interaction_history.max_entries = 2;
        let stm = ShortTermMemory::new(tiers);

        let first = interaction(0);
        let first_id = first.id;
        stm.store(first, CacheSource::Direct, &StoreOptions::default())
            .expect("store");
        for n in 1..3 {
            stm.store(interaction(n), CacheSource::Direct, &StoreOptions::default())
                .expect("store");
        }

        // The third store evicted the first; the indexes must agree.
        assert!(stm.get(&first_id, None).is_none());
        assert!(!stm.index_references(&first_id));
        let view = stm.player_view(&steam()).expect("player");
        let container_bytes = stm
            .stats()
            .per_type
            .iter()
            .find(|s| s.memory_type == MemoryType::InteractionHistory)
            .expect("stats")
            .bytes_used;
        assert_eq!(view.bytes_used, container_bytes);
    }

    #[test]
    fn query_filters_tags_and_paginates() {
        let stm = coordinator();
        for n in 0..5 {
            stm.store(interaction(n), CacheSource::Direct, &StoreOptions::default())
                .expect("store");
        }
        stm.store(profile(), CacheSource::Direct, &StoreOptions::default())
            .expect("store");

        let filters = MemoryFilters {
            tags: vec!["advice".to_string()],
            ..MemoryFilters::default()
        };
        let options = QueryOptions {
            limit: 2,
            ..QueryOptions::default()
        };
        let result = stm.query(&filters, &options);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.total_count, 5);
        assert!(result.has_more);
        assert!(result.from_cache);
    }

    #[test]
    fn expired_entries_are_invisible_to_query_and_stats() {
        let stm = coordinator();
        let record = profile().with_expiry(Utc::now() - ChronoDuration::milliseconds(1));
        let id = record.id;
        stm.store(record, CacheSource::Direct, &StoreOptions::default())
            .expect("store");

        assert!(stm.get(&id, None).is_none());
        let result = stm.query(&MemoryFilters::default(), &QueryOptions::default());
        assert!(result.entries.is_empty());
        // The failed get lazily evicted it, so stats exclude it too.
        assert_eq!(stm.stats().total_entries, 0);
    }

    #[test]
    fn cleanup_twice_removes_nothing_the_second_time() {
        let stm = coordinator();
        for _ in 0..3 {
            let record = interaction(0).with_expiry(Utc::now() - ChronoDuration::seconds(1));
            stm.store(record, CacheSource::Direct, &StoreOptions::default())
                .expect("store");
        }
        assert_eq!(stm.cleanup(), 3);
        assert_eq!(stm.cleanup(), 0);
    }
}
