//! Runtime counters and operation timing.
//!
//! Lock-free `AtomicU64` counters cover the hot paths (store, cache hit/miss,
//! promotion); a small ring-buffer timer tracks query latency against the
//! configured budget. Snapshots export as Prometheus-compatible text for
//! dashboards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters for high-frequency service events.
pub struct ServiceCounters {
    /// Records stored since startup.
    pub stores: AtomicU64,
    /// Reads served from the short-term tier.
    pub cache_hits: AtomicU64,
    /// Reads that fell through to the long-term tier.
    pub cache_misses: AtomicU64,
    /// Entries promoted from the long-term tier into the cache.
    pub promotions: AtomicU64,
    /// Expired records removed by cleanup passes.
    pub cleanup_removed: AtomicU64,
    /// Structured queries executed.
    pub queries: AtomicU64,
    /// Text searches executed.
    pub searches: AtomicU64,
}

impl ServiceCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stores: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            cleanup_removed: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            searches: AtomicU64::new(0),
        }
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            stores: self.stores.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            cleanup_removed: self.cleanup_removed.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone)]
pub struct CounterSnapshot {
    /// Records stored.
    pub stores: u64,
    /// Cache hits.
    pub cache_hits: u64,
    /// Cache misses.
    pub cache_misses: u64,
    /// Promotions into the cache.
    pub promotions: u64,
    /// Expired records removed.
    pub cleanup_removed: u64,
    /// Structured queries executed.
    pub queries: u64,
    /// Text searches executed.
    pub searches: u64,
}

impl CounterSnapshot {
    /// Cache hit rate over all reads so far, in [0, 1].
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP coachmem_stores_total Records stored\n\
             # TYPE coachmem_stores_total counter\n\
             coachmem_stores_total {}\n\
             # HELP coachmem_cache_hits_total Reads served from cache\n\
             # TYPE coachmem_cache_hits_total counter\n\
             coachmem_cache_hits_total {}\n\
             # HELP coachmem_cache_misses_total Reads served from persistence\n\
             # TYPE coachmem_cache_misses_total counter\n\
             coachmem_cache_misses_total {}\n\
             # HELP coachmem_promotions_total Entries promoted into cache\n\
             # TYPE coachmem_promotions_total counter\n\
             coachmem_promotions_total {}\n\
             # HELP coachmem_cleanup_removed_total Expired records removed\n\
             # TYPE coachmem_cleanup_removed_total counter\n\
             coachmem_cleanup_removed_total {}\n\
             # HELP coachmem_queries_total Structured queries executed\n\
             # TYPE coachmem_queries_total counter\n\
             coachmem_queries_total {}\n\
             # HELP coachmem_searches_total Text searches executed\n\
             # TYPE coachmem_searches_total counter\n\
             coachmem_searches_total {}\n",
            self.stores,
            self.cache_hits,
            self.cache_misses,
            self.promotions,
            self.cleanup_removed,
            self.queries,
            self.searches,
        )
    }
}

// ---------------------------------------------------------------------------
// Operation timer
// ---------------------------------------------------------------------------

/// Ring buffer of recent operation timings checked against a budget.
pub struct OpTimer {
    /// Maximum allowed milliseconds per operation.
    budget_ms: f64,
    history: Mutex<TimingHistory>,
}

struct TimingHistory {
    timings: Vec<f64>,
    write_idx: usize,
    count: u64,
    last_over_budget: bool,
}

impl OpTimer {
    /// Create a new timer with the given budget (milliseconds).
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(TimingHistory {
                timings: vec![0.0; 256],
                write_idx: 0,
                count: 0,
                last_over_budget: false,
            }),
        }
    }

    /// Begin timing an operation. The guard records elapsed time on drop.
    pub fn begin(&self) -> OpGuard<'_> {
        OpGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    /// Record an operation timing manually (milliseconds).
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        let len = h.timings.len();
        h.timings[idx] = ms;
        h.write_idx = (idx + 1) % len;
        h.count += 1;
        h.last_over_budget = ms > self.budget_ms;
    }

    /// Whether the most recent operation exceeded the budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.history.lock().last_over_budget
    }

    /// Number of operations recorded.
    #[must_use]
    pub fn op_count(&self) -> u64 {
        self.history.lock().count
    }

    /// The configured budget in milliseconds.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    /// Summary statistics over the retained history window.
    #[must_use]
    pub fn stats(&self) -> TimingStats {
        let h = self.history.lock();
        let n = (h.count as usize).min(h.timings.len());
        if n == 0 {
            return TimingStats {
                mean_ms: 0.0,
                p95_ms: 0.0,
                max_ms: 0.0,
                over_budget_ratio: 0.0,
            };
        }
        let window = &h.timings[..n.min(h.timings.len())];
        let mut sorted: Vec<f64> = if (h.count as usize) <= h.timings.len() {
            window.to_vec()
        } else {
            h.timings.clone()
        };
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = sorted.iter().sum();
        let over = sorted.iter().filter(|&&t| t > self.budget_ms).count();
        TimingStats {
            mean_ms: sum / sorted.len() as f64,
            p95_ms: sorted[(sorted.len() as f64 * 0.95) as usize],
            max_ms: sorted[sorted.len() - 1],
            over_budget_ratio: over as f64 / sorted.len() as f64,
        }
    }
}

/// RAII guard that records elapsed time when dropped.
pub struct OpGuard<'a> {
    timer: &'a OpTimer,
    start: Instant,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.timer.record(ms);
    }
}

/// Summary statistics over a timing window.
#[derive(Debug, Clone)]
pub struct TimingStats {
    /// Mean latency in milliseconds.
    pub mean_ms: f64,
    /// 95th percentile latency in milliseconds.
    pub p95_ms: f64,
    /// Maximum observed latency.
    pub max_ms: f64,
    /// Ratio of operations that exceeded the budget (0.0–1.0).
    pub over_budget_ratio: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_zero() {
        let c = ServiceCounters::new();
        let snap = c.snapshot();
        assert_eq!(snap.stores, 0);
        assert_eq!(snap.cache_hits, 0);
        assert!((snap.hit_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counters_increment_and_snapshot() {
        let c = ServiceCounters::new();
        c.stores.fetch_add(5, Ordering::Relaxed);
        c.cache_hits.fetch_add(3, Ordering::Relaxed);
        c.cache_misses.fetch_add(1, Ordering::Relaxed);
        c.promotions.fetch_add(1, Ordering::Relaxed);

        let snap = c.snapshot();
        assert_eq!(snap.stores, 5);
        assert_eq!(snap.cache_hits, 3);
        assert_eq!(snap.cache_misses, 1);
        assert!((snap.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn prometheus_format_valid() {
        let c = ServiceCounters::new();
        c.stores.fetch_add(42, Ordering::Relaxed);
        let prom = c.snapshot().to_prometheus();
        assert!(prom.contains("coachmem_stores_total 42"));
        assert!(prom.contains("# TYPE"));
        assert!(prom.contains("# HELP"));
    }

    #[test]
    fn timer_records_and_flags_over_budget() {
        let timer = OpTimer::new(2.0);
        assert_eq!(timer.op_count(), 0);

        timer.record(0.5);
        timer.record(1.5);
        assert_eq!(timer.op_count(), 2);
        assert!(!timer.is_over_budget());

        timer.record(3.0);
        assert!(timer.is_over_budget());
    }

    #[test]
    fn guard_records_timing() {
        let timer = OpTimer::new(100.0);
        {
            let _guard = timer.begin();
            let mut _sum = 0u64;
            for i in 0..1000 {
                _sum += i;
            }
        }
        assert_eq!(timer.op_count(), 1);
        assert!(timer.stats().max_ms < 100.0);
    }

    #[test]
    fn stats_over_window() {
        let timer = OpTimer::new(2.0);
        for i in 0..100 {
            timer.record(f64::from(i) * 0.01); // 0.00 to 0.99ms
        }
        let stats = timer.stats();
        assert!(stats.mean_ms > 0.0);
        assert!(stats.p95_ms >= stats.mean_ms);
        assert!(stats.max_ms >= stats.p95_ms);
        assert!((stats.over_budget_ratio - 0.0).abs() < 1e-9);
    }
}
