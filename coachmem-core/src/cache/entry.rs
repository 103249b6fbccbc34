//! Cache entry model — a [`MemoryRecord`] wrapped with cache metadata.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::memory::MemoryRecord;

/// Fixed per-entry bookkeeping overhead added to the serialized-size proxy.
const ENTRY_OVERHEAD_BYTES: usize = 128;

/// How an entry got into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Written by the cacheability policy at store time.
    Direct,
    /// Copied in after repeated persistent-tier access.
    Promotion,
    /// Warmed at startup.
    Preload,
}

/// A cached record plus the metadata the container and the priority score
/// need: recency, access counts, expiry, and an estimated byte size.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The wrapped record.
    pub record: MemoryRecord,
    /// When the entry entered the cache.
    pub cached_at: DateTime<Utc>,
    /// Last read through `get`.
    pub last_accessed: DateTime<Utc>,
    /// Number of reads through `get`.
    pub access_count: u32,
    /// When the entry stops being visible to reads. Record expiry wins over
    /// the type-default TTL.
    pub expires_at: Option<DateTime<Utc>>,
    /// Estimated size, charged against the container's byte budget.
    pub size_bytes: usize,
    /// Multi-factor priority score in [0, 1]; refreshed on access.
    pub priority: f32,
    /// How the entry got here.
    pub source: CacheSource,
    /// Whether the cached copy has changes not yet reflected durably.
    /// The persistent tier writes first, so this only flips when a cache
    /// mirror races ahead of a failed durable write being retried.
    pub dirty: bool,
}

impl CacheEntry {
    /// Wrap a record for caching. `default_ttl` applies only when the
    /// record carries no expiry of its own.
    #[must_use]
    pub fn new(
        record: MemoryRecord,
        default_ttl: Duration,
        source: CacheSource,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = record.expires_at.or_else(|| now.checked_add_signed(default_ttl));
        let size_bytes = estimate_size(&record);
        let mut entry = Self {
            record,
            cached_at: now,
            last_accessed: now,
            access_count: 0,
            expires_at,
            size_bytes,
            priority: 0.0,
            source,
            dirty: false,
        };
        entry.priority = super::score::priority(&entry, now);
        entry
    }

    /// Whether the entry is invisible to reads at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Record a read: bump recency, access count, and the priority score.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
        self.priority = super::score::priority(self, now);
    }

    /// Age of the entry in seconds at `now`.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_seconds()
    }
}

/// Deterministic, monotonic size proxy: serialized JSON length plus a fixed
/// overhead. Growing a record never shrinks the estimate.
#[must_use]
pub fn estimate_size<T: Serialize>(value: &T) -> usize {
    let serialized = serde_json::to_vec(value).map_or(0, |v| v.len());
    serialized + ENTRY_OVERHEAD_BYTES
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
