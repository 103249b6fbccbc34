//! Bounded per-type cache container.
//!
//! Recency order comes from [`lru::LruCache`]; count and byte budgets are
//! accounted on top. Eviction is pure LRU — the tail goes first until the
//! incoming entry fits. Expiry is lazy on `get` plus a full-scan `cleanup`.

use chrono::{DateTime, Utc};
use lru::LruCache;

use super::entry::CacheEntry;
use super::score;
use crate::types::{MemoryId, MemoryType};

/// A bounded, recency-ordered container for one memory type.
pub struct BoundedCache {
    memory_type: MemoryType,
    entries: LruCache<MemoryId, CacheEntry>,
    max_entries: usize,
    max_bytes: usize,
    bytes_used: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    dropped: Vec<MemoryId>,
}

impl BoundedCache {
    /// Create a container with the given count and byte budgets.
    #[must_use]
    pub fn new(memory_type: MemoryType, max_entries: usize, max_bytes: usize) -> Self {
        Self {
            memory_type,
            entries: LruCache::unbounded(),
            max_entries: max_entries.max(1),
            max_bytes,
            bytes_used: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            dropped: Vec::new(),
        }
    }

    /// Which memory type this container serves.
    #[must_use]
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// O(1) lookup. Lazily evicts an expired entry and reports a miss; on a
    /// hit, bumps recency order, access count, and priority.
    pub fn get(&mut self, id: &MemoryId, now: DateTime<Utc>) -> Option<CacheEntry> {
        let expired = match self.entries.peek(id) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            if let Some(entry) = self.entries.pop(id) {
                self.bytes_used = self.bytes_used.saturating_sub(entry.size_bytes);
                self.dropped.push(*id);
            }
            self.misses += 1;
            return None;
        }
        // get_mut promotes the entry to most-recently-used.
        let entry = self.entries.get_mut(id)?;
        entry.touch(now);
        self.hits += 1;
        Some(entry.clone())
    }

    /// Insert or replace an entry, evicting from the LRU tail until both
    /// budgets fit. Returns `false` if the entry alone exceeds the byte
    /// budget — nothing is evicted in that case.
    pub fn put(&mut self, id: MemoryId, entry: CacheEntry) -> bool {
        if entry.size_bytes > self.max_bytes {
            return false;
        }
        if let Some(old) = self.entries.pop(&id) {
            self.bytes_used = self.bytes_used.saturating_sub(old.size_bytes);
        }
        while self.entries.len() >= self.max_entries
            || self.bytes_used + entry.size_bytes > self.max_bytes
        {
            match self.entries.pop_lru() {
                Some((victim_id, victim)) => {
                    self.bytes_used = self.bytes_used.saturating_sub(victim.size_bytes);
                    self.evictions += 1;
                    self.dropped.push(victim_id);
                }
                None => break,
            }
        }
        self.bytes_used += entry.size_bytes;
        self.entries.put(id, entry);
        true
    }

    /// Remove an entry; returns it if present.
    pub fn remove(&mut self, id: &MemoryId) -> Option<CacheEntry> {
        let entry = self.entries.pop(id)?;
        self.bytes_used = self.bytes_used.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes_used = 0;
        self.dropped.clear();
    }

    /// Full scan removing expired entries; returns how many went away.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<MemoryId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(entry) = self.entries.pop(id) {
                self.bytes_used = self.bytes_used.saturating_sub(entry.size_bytes);
                self.dropped.push(*id);
            }
        }
        expired.len()
    }

    /// Drain the ids this container dropped on its own (LRU eviction, lazy
    /// expiry, sweep) since the last drain. Explicit `remove`/`clear` calls
    /// are not logged — the caller already knows those ids.
    pub fn take_dropped(&mut self) -> Vec<MemoryId> {
        std::mem::take(&mut self.dropped)
    }

    /// Linear filter for the query engine. Does not promote recency.
    pub fn entries_where(&self, mut predicate: impl FnMut(&CacheEntry) -> bool) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .filter(|(_, e)| predicate(e))
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Whether an unexpired entry exists for `id`, without touching recency.
    #[must_use]
    pub fn contains(&self, id: &MemoryId, now: DateTime<Utc>) -> bool {
        self.entries.peek(id).is_some_and(|e| !e.is_expired(now))
    }

    /// Clone an unexpired entry without touching recency or access counts.
    #[must_use]
    pub fn peek(&self, id: &MemoryId, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.entries
            .peek(id)
            .filter(|e| !e.is_expired(now))
            .cloned()
    }

    /// Mutate an entry in place without bumping its access count. Returns
    /// `false` if absent. Recomputes the byte charge from the new record.
    pub fn mutate(
        &mut self,
        id: &MemoryId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut CacheEntry),
    ) -> bool {
        let Some(entry) = self.entries.peek_mut(id) else {
            return false;
        };
        let old_size = entry.size_bytes;
        f(entry);
        entry.size_bytes = super::entry::estimate_size(&entry.record);
        entry.priority = score::priority(entry, now);
        let new_size = entry.size_bytes;
        self.bytes_used = self.bytes_used.saturating_sub(old_size) + new_size;
        true
    }

    /// Current entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently charged against the budget.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Snapshot of container statistics at `now`.
    #[must_use]
    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let mut oldest_age_secs = 0;
        let mut newest_age_secs = i64::MAX;
        let mut access_total: u64 = 0;
        for (_, entry) in self.entries.iter() {
            let age = entry.age_secs(now);
            oldest_age_secs = oldest_age_secs.max(age);
            newest_age_secs = newest_age_secs.min(age);
            access_total += u64::from(entry.access_count);
        }
        let count = self.entries.len();
        if count == 0 {
            newest_age_secs = 0;
        }
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        CacheStats {
            memory_type: self.memory_type,
            entry_count: count,
            bytes_used: self.bytes_used,
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            oldest_age_secs,
            newest_age_secs,
            mean_access_count: if count == 0 {
                0.0
            } else {
                access_total as f64 / count as f64
            },
            efficiency: hit_rate,
        }
    }
}

impl std::fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("memory_type", &self.memory_type)
            .field("len", &self.entries.len())
            .field("bytes_used", &self.bytes_used)
            .finish_non_exhaustive()
    }
}

/// Point-in-time statistics for one container.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Which container.
    pub memory_type: MemoryType,
    /// Unexpired + expired-but-unswept entries currently held.
    pub entry_count: usize,
    /// Bytes charged against the budget.
    pub bytes_used: usize,
    /// Configured entry cap.
    pub max_entries: usize,
    /// Configured byte budget.
    pub max_bytes: usize,
    /// Lookup hits since creation.
    pub hits: u64,
    /// Lookup misses since creation.
    pub misses: u64,
    /// LRU evictions since creation.
    pub evictions: u64,
    /// Age of the oldest entry, seconds.
    pub oldest_age_secs: i64,
    /// Age of the newest entry, seconds.
    pub newest_age_secs: i64,
    /// Mean access count across held entries.
    pub mean_access_count: f64,
    /// Hit-rate-derived efficiency in [0, 1].
    pub efficiency: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheSource;
    use crate::memory::{InteractionHistory, InteractionKind, MemoryPayload, MemoryRecord};
    use crate::types::{Importance, SteamId};
    use chrono::Duration;

    fn entry(now: DateTime<Utc>) -> (MemoryId, CacheEntry) {
        entry_with_ttl(now, Duration::hours(1))
    }

    fn entry_with_ttl(now: DateTime<Utc>, ttl: Duration) -> (MemoryId, CacheEntry) {
        let record = MemoryRecord::new(
            Importance::Medium,
            MemoryPayload::InteractionHistory(InteractionHistory::new(
                SteamId::new("76561198000000001"),
                InteractionKind::Advice,
                "hold the angle wider",
            )),
        );
        let id = record.id;
        (id, CacheEntry::new(record, ttl, CacheSource::Direct, now))
    }

    fn cache(max_entries: usize) -> BoundedCache {
        BoundedCache::new(MemoryType::InteractionHistory, max_entries, 1024 * 1024)
    }

    #[test]
    fn get_hit_bumps_access_count() {
        let now = Utc::now();
        let mut cache = cache(10);
        let (id, e) = entry(now);
        assert!(cache.put(id, e));

        let hit = cache.get(&id, now).expect("hit");
        assert_eq!(hit.access_count, 1);
        let hit = cache.get(&id, now).expect("hit");
        assert_eq!(hit.access_count, 2);

        let stats = cache.stats(now);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn count_cap_evicts_exactly_lru() {
        let now = Utc::now();
        let mut cache = cache(3);
        let (id_a, a) = entry(now);
        let (id_b, b) = entry(now);
        let (id_c, c) = entry(now);
        cache.put(id_a, a);
        cache.put(id_b, b);
        cache.put(id_c, c);

        // Touch A so B becomes the LRU victim.
        cache.get(&id_a, now);

        let (id_d, d) = entry(now);
        cache.put(id_d, d);

        assert!(cache.contains(&id_a, now), "recently used survives");
        assert!(!cache.contains(&id_b, now), "least-recently-used evicted");
        assert!(cache.contains(&id_c, now));
        assert!(cache.contains(&id_d, now));
        assert_eq!(cache.stats(now).evictions, 1);
    }

    #[test]
    fn byte_budget_is_never_exceeded() {
        let now = Utc::now();
        let (_, probe) = entry(now);
        let budget = probe.size_bytes * 3 + probe.size_bytes / 2;
        let mut cache = BoundedCache::new(MemoryType::InteractionHistory, 100, budget);

        for _ in 0..10 {
            let (id, e) = entry(now);
            assert!(cache.put(id, e));
            assert!(cache.bytes_used() <= budget);
        }
        assert!(cache.len() <= 3);
    }

    #[test]
    fn oversized_entry_is_rejected_without_eviction() {
        let now = Utc::now();
        let (_, probe) = entry(now);
        let mut cache = BoundedCache::new(MemoryType::InteractionHistory, 100, probe.size_bytes * 2);

        let (id_a, a) = entry(now);
        assert!(cache.put(id_a, a));

        let (id_big, mut big) = entry(now);
        big.size_bytes = probe.size_bytes * 3;
        assert!(!cache.put(id_big, big), "single entry over budget rejected");
        assert!(cache.contains(&id_a, now), "resident entries untouched");
    }

    #[test]
    fn expired_entry_lazily_evicted_on_get() {
        let now = Utc::now();
        let mut cache = cache(10);
        let (id, e) = entry_with_ttl(now, Duration::milliseconds(-1));
        cache.put(id, e);

        assert!(cache.get(&id, now).is_none());
        assert_eq!(cache.len(), 0, "expired entry removed by the failed get");
        assert_eq!(cache.stats(now).misses, 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let now = Utc::now();
        let mut cache = cache(10);
        for _ in 0..3 {
            let (id, e) = entry_with_ttl(now, Duration::milliseconds(-1));
            cache.put(id, e);
        }
        let (id_live, live) = entry(now);
        cache.put(id_live, live);

        assert_eq!(cache.cleanup(now), 3);
        assert_eq!(cache.cleanup(now), 0, "second sweep removes nothing");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entries_where_does_not_promote() {
        let now = Utc::now();
        let mut cache = cache(2);
        let (id_a, a) = entry(now);
        let (id_b, b) = entry(now);
        cache.put(id_a, a);
        cache.put(id_b, b);

        // Scanning must not make A recently-used.
        let all = cache.entries_where(|_| true);
        assert_eq!(all.len(), 2);

        let (id_c, c) = entry(now);
        cache.put(id_c, c);
        assert!(!cache.contains(&id_a, now), "A was still the LRU victim");
    }

    #[test]
    fn dropped_ids_are_reported_once() {
        let now = Utc::now();
        let mut cache = cache(3);
        let (id_a, a) = entry(now);
        let (id_b, b) = entry(now);
        let (id_c, c) = entry(now);
        cache.put(id_a, a);
        cache.put(id_b, b);
        cache.put(id_c, c);

        let (id_x, x) = entry_with_ttl(now, Duration::milliseconds(-1));
        cache.put(id_x, x); // evicts A
        assert!(cache.get(&id_x, now).is_none()); // lazy expiry drops X

        let dropped = cache.take_dropped();
        assert_eq!(dropped, vec![id_a, id_x]);
        assert!(cache.take_dropped().is_empty(), "drained log stays drained");

        // Explicit removal is not logged.
        cache.remove(&id_b);
        assert!(cache.take_dropped().is_empty());
    }

    #[test]
    fn replacing_an_entry_adjusts_bytes() {
        let now = Utc::now();
        let mut cache = cache(10);
        let (id, e) = entry(now);
        let size = e.size_bytes;
        cache.put(id, e.clone());
        cache.put(id, e);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes_used(), size);
    }
}
