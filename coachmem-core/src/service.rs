//! The unified memory service — one facade over both tiers.
//!
//! Reads go cache-first and fall through to SQLite; writes always persist
//! and additionally cache records the admission policy considers hot. A
//! per-id access tracker promotes persistently-read records into the cache
//! once they cross the configured threshold, so repeat lookups stop paying
//! the database round trip.
//!
//! The service is cheap to clone (everything lives behind one `Arc`) and
//! expects a tokio runtime: `initialize` spawns the background cleanup and
//! tracker-pruning tasks, and the persistent query path runs on the
//! blocking pool under the configured timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheSource, ShortTermMemory, ShortTermStats, StoreOptions};
use crate::config::{CoachMemConfig, PreloadStrategy};
use crate::error::{CoachMemError, Result};
use crate::memory::{MemoryRecord, MemoryUpdate};
use crate::metrics::{CounterSnapshot, OpTimer, ServiceCounters, TimingStats};
use crate::query::{MemoryFilters, QueryOptions, QueryResult, SearchOptions, SortBy, SortOrder};
use crate::store::LongTermStore;
use crate::types::{Importance, MemoryId, MemoryType, SessionId, SteamId};

/// Most search results promoted into the cache per call.
const MAX_SEARCH_PROMOTIONS: usize = 10;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification emitted after a mutation commits. Delivery is decoupled
/// from the call path: a full or absent subscriber never blocks an
/// operation, lagging subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub enum MemoryEvent {
    /// A record was persisted (and possibly cached).
    Stored {
        /// The new record's id.
        id: MemoryId,
        /// Its memory type.
        memory_type: MemoryType,
    },
    /// A record was patched in place.
    Updated {
        /// The patched record's id.
        id: MemoryId,
    },
    /// A record was removed from both tiers.
    Removed {
        /// The removed record's id.
        id: MemoryId,
    },
    /// A persistent record was copied into the cache.
    Promoted {
        /// The promoted record's id.
        id: MemoryId,
    },
    /// A cleanup pass finished.
    CleanupCompleted {
        /// Entries removed across both tiers.
        removed: usize,
    },
}

// ---------------------------------------------------------------------------
// Access tracker
// ---------------------------------------------------------------------------

/// Counts cache misses per id so repeatedly-fetched records get promoted.
#[derive(Debug, Default)]
struct AccessTracker {
    counts: HashMap<MemoryId, u32>,
}

impl AccessTracker {
    /// Record one persistent-tier read of `id`; returns the running count.
    fn record(&mut self, id: MemoryId) -> u32 {
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop an id once it has been promoted.
    fn forget(&mut self, id: &MemoryId) {
        self.counts.remove(id);
    }

    /// Keep only the `keep` most-counted ids. Returns how many were dropped.
    fn prune(&mut self, keep: usize) -> usize {
        if self.counts.len() <= keep {
            return 0;
        }
        let mut ranked: Vec<(MemoryId, u32)> =
            self.counts.iter().map(|(id, n)| (*id, *n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let dropped = ranked.len() - keep;
        self.counts = ranked.into_iter().take(keep).collect();
        dropped
    }

    fn len(&self) -> usize {
        self.counts.len()
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// How a query is routed across the two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryStrategy {
    /// Serve from the cache scan; fall through only on a short page.
    PreferCache,
    /// Run both tiers and merge, deduplicated, cache copy winning.
    Combine,
    /// Go straight to SQLite.
    PersistentOnly,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Everything the service shares across clones and background tasks.
struct ServiceInner {
    config: CoachMemConfig,
    short_term: ShortTermMemory,
    store: Mutex<LongTermStore>,
    tracker: Mutex<AccessTracker>,
    counters: ServiceCounters,
    query_timer: OpTimer,
    events: broadcast::Sender<MemoryEvent>,
    initialized: AtomicBool,
}

impl ServiceInner {
    /// Sweep expired entries from both tiers. Shared by the background task
    /// and the manual [`MemoryService::cleanup`].
    fn cleanup_both(&self) -> Result<usize> {
        let removed_cache = self.short_term.cleanup();
        let removed_store = self.store.lock().cleanup_expired(Utc::now())?;
        let total = removed_cache + removed_store;
        self.counters
            .cleanup_removed
            .fetch_add(total as u64, Ordering::Relaxed);
        if total > 0 {
            debug!(removed_cache, removed_store, "cleanup pass");
        }
        self.emit(MemoryEvent::CleanupCompleted { removed: total });
        Ok(total)
    }

    /// Fire-and-forget notification; no subscribers is not an error.
    fn emit(&self, event: MemoryEvent) {
        let _ = self.events.send(event);
    }
}

/// A point-in-time view of both tiers for dashboards and health checks.
#[derive(Debug)]
pub struct ServiceStatus {
    /// Whether background tasks are running.
    pub initialized: bool,
    /// Cache-tier statistics.
    pub short_term: ShortTermStats,
    /// Records in the persistent tier.
    pub persistent_entries: usize,
    /// Persistent records grouped by type.
    pub persistent_by_type: Vec<(MemoryType, usize)>,
    /// Ids currently tracked for promotion.
    pub tracked_ids: usize,
    /// Service counters since startup.
    pub counters: CounterSnapshot,
    /// Persistent-query latency statistics.
    pub query_timing: TimingStats,
}

/// The dual-tier memory service.
#[derive(Clone)]
pub struct MemoryService {
    inner: Arc<ServiceInner>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MemoryService {
    /// Create a service backed by the database at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Config`] on invalid configuration or
    /// [`CoachMemError::Database`] if the database cannot be opened.
    pub fn new(config: CoachMemConfig) -> Result<Self> {
        config.validate()?;
        let store = LongTermStore::open(&config.persistence.path, &config.persistence)?;
        Ok(Self::from_parts(config, store))
    }

    /// Create a service over an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Config`] on invalid configuration or
    /// [`CoachMemError::Database`] on SQLite failure.
    pub fn in_memory(config: CoachMemConfig) -> Result<Self> {
        config.validate()?;
        let store = LongTermStore::open_in_memory()?;
        Ok(Self::from_parts(config, store))
    }

    fn from_parts(config: CoachMemConfig, store: LongTermStore) -> Self {
        let query_timeout_ms = config.service.query_timeout_ms;
        let short_term = ShortTermMemory::new(config.caches.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ServiceInner {
                config,
                short_term,
                store: Mutex::new(store),
                tracker: Mutex::new(AccessTracker::default()),
                counters: ServiceCounters::new(),
                query_timer: OpTimer::new(query_timeout_ms as f64),
                events,
                initialized: AtomicBool::new(false),
            }),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to mutation notifications. Each subscriber gets its own
    /// buffered stream; dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start background maintenance and warm the cache per the preload
    /// strategy. Idempotent. Three timers run until `dispose`: the
    /// dual-tier cleanup, a cache-only sweep on its own (slower) cadence,
    /// and tracker pruning.
    ///
    /// # Errors
    ///
    /// Returns an error if the preload query fails.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let warmed = self.preload().await?;
        info!(
            warmed,
            strategy = ?self.inner.config.service.preload_strategy,
            "memory service initialized"
        );

        let cleanup_inner = Arc::clone(&self.inner);
        let cleanup_every =
            StdDuration::from_millis(self.inner.config.service.service_cleanup_interval_ms.max(1));
        let cleanup_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(e) = cleanup_inner.cleanup_both() {
                    warn!(error = %e, "background cleanup failed");
                }
            }
        });

        let sweep_inner = Arc::clone(&self.inner);
        let sweep_every =
            StdDuration::from_millis(self.inner.config.service.cleanup_interval_ms.max(1));
        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = sweep_inner.short_term.cleanup();
                if removed > 0 {
                    debug!(removed, "short-term sweep");
                }
            }
        });

        let tracker_inner = Arc::clone(&self.inner);
        let prune_every = StdDuration::from_millis(
            self.inner.config.service.tracker_optimize_interval_ms.max(1),
        );
        let keep = self.inner.config.service.tracker_capacity;
        let tracker_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(prune_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let dropped = tracker_inner.tracker.lock().prune(keep);
                if dropped > 0 {
                    debug!(dropped, keep, "access tracker pruned");
                }
            }
        });

        self.tasks
            .lock()
            .extend([cleanup_task, sweep_task, tracker_task]);
        Ok(())
    }

    /// Stop background tasks and drop the cache tier. The persistent tier
    /// stays intact on disk.
    pub fn dispose(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.short_term.clear();
        self.inner.initialized.store(false, Ordering::SeqCst);
        info!("memory service disposed");
    }

    async fn preload(&self) -> Result<usize> {
        let levels: &[Importance] = match self.inner.config.service.preload_strategy {
            PreloadStrategy::Aggressive => &[
                Importance::Critical,
                Importance::High,
                Importance::Medium,
                Importance::Low,
            ],
            PreloadStrategy::Conservative => &[Importance::Critical, Importance::High],
            PreloadStrategy::None => return Ok(0),
        };

        let mut warmed = 0;
        for importance in levels {
            let filters = MemoryFilters {
                importance: Some(*importance),
                ..MemoryFilters::default()
            };
            let options = QueryOptions {
                limit: self.inner.config.service.batch_size,
                sort_by: SortBy::UpdatedAt,
                sort_order: SortOrder::Desc,
                ..QueryOptions::default()
            };
            let result = self.persistent_query(&filters, &options).await?;
            for record in result.entries {
                if self
                    .inner
                    .short_term
                    .store(record, CacheSource::Preload, &StoreOptions::default())
                    .is_ok()
                {
                    warmed += 1;
                }
            }
        }
        Ok(warmed)
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Store a record: always persisted, additionally cached when the
    /// admission policy considers it hot. A full cache rejecting the entry
    /// degrades to persistent-only rather than failing the write.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] on a malformed payload or
    /// [`CoachMemError::Database`] if the persistent write fails.
    pub async fn store(&self, record: MemoryRecord) -> Result<MemoryId> {
        record.validate()?;
        let id = record.id;
        let memory_type = record.memory_type();
        self.inner.store.lock().store(&record)?;
        self.inner.counters.stores.fetch_add(1, Ordering::Relaxed);
        self.inner.emit(MemoryEvent::Stored { id, memory_type });

        if is_cacheable(&record) {
            // The persistent write already committed; a cache-tier failure
            // degrades the record to persistent-only, it never fails the
            // store.
            if let Err(e) = self
                .inner
                .short_term
                .store(record, CacheSource::Direct, &StoreOptions::default())
            {
                warn!(%id, %memory_type, error = %e, "cache rejected record, persisted only");
            }
        }
        Ok(id)
    }

    /// Look up a record, cache-first. Persistent hits feed the promotion
    /// tracker; crossing the threshold copies the record into the cache so
    /// the next read is a hit.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] if the fallthrough read fails.
    pub async fn get(
        &self,
        id: &MemoryId,
        hint: Option<MemoryType>,
    ) -> Result<Option<MemoryRecord>> {
        if let Some(record) = self.inner.short_term.get(id, hint) {
            self.inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(record));
        }
        self.inner
            .counters
            .cache_misses
            .fetch_add(1, Ordering::Relaxed);

        let Some(record) = self.inner.store.lock().get(id)? else {
            return Ok(None);
        };
        // Expired rows linger until the next cleanup pass but never surface.
        if record.is_expired(Utc::now()) {
            return Ok(None);
        }

        let count = self.inner.tracker.lock().record(*id);
        if count >= self.inner.config.service.promotion_threshold {
            self.promote(record.clone());
        }
        Ok(Some(record))
    }

    /// Merge a partial update into both tiers. The persistent tier is the
    /// source of truth; the cached copy (if any) is patched to match.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] on an invalid patch or
    /// [`CoachMemError::Database`] on a persistence failure.
    pub async fn update(
        &self,
        id: &MemoryId,
        patch: &MemoryUpdate,
        hint: Option<MemoryType>,
    ) -> Result<bool> {
        let updated = self.inner.store.lock().update(id, patch)?;
        if updated {
            self.inner.short_term.update(id, patch, hint)?;
            self.inner.emit(MemoryEvent::Updated { id: *id });
        }
        Ok(updated)
    }

    /// Remove a record from both tiers. Returns whether either held it.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn remove(&self, id: &MemoryId, hint: Option<MemoryType>) -> Result<bool> {
        let in_cache = self.inner.short_term.remove(id, hint);
        self.inner.tracker.lock().forget(id);
        let in_store = self.inner.store.lock().delete(id)?;
        let removed = in_cache || in_store;
        if removed {
            self.inner.emit(MemoryEvent::Removed { id: *id });
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Query / search
    // ------------------------------------------------------------------

    /// Filtered query routed across the tiers. Owner-scoped short pages
    /// prefer the cache; tag filters and large pages combine both tiers;
    /// everything else goes straight to SQLite. The persistent leg runs
    /// under the configured timeout and yields an empty result on expiry.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn query(
        &self,
        filters: &MemoryFilters,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        self.inner.counters.queries.fetch_add(1, Ordering::Relaxed);
        let strategy = self.choose_strategy(filters, options);
        debug!(?strategy, "query routed");

        match strategy {
            QueryStrategy::PreferCache => {
                let cached = self.inner.short_term.query(filters, options);
                if cached.entries.len() >= options.limit {
                    return Ok(cached);
                }
                self.persistent_query(filters, options).await
            }
            QueryStrategy::PersistentOnly => self.persistent_query(filters, options).await,
            QueryStrategy::Combine => {
                // Pull full pages from both sides, merge, then paginate the
                // merged set. The cache copy wins on id collision.
                let wide = QueryOptions {
                    limit: options.limit + options.offset,
                    offset: 0,
                    ..options.clone()
                };
                let cached = self.inner.short_term.query(filters, &wide);
                let persisted = self.persistent_query(filters, &wide).await?;

                let mut seen: HashMap<MemoryId, MemoryRecord> = HashMap::new();
                for record in persisted.entries {
                    seen.insert(record.id, record);
                }
                for record in cached.entries {
                    seen.insert(record.id, record);
                }
                let mut merged: Vec<MemoryRecord> = seen.into_values().collect();
                crate::query::sort_records(&mut merged, options.sort_by, options.sort_order);

                let total_count = persisted.total_count.max(merged.len());
                let entries: Vec<MemoryRecord> = merged
                    .into_iter()
                    .skip(options.offset)
                    .take(options.limit)
                    .collect();
                let returned = entries.len();
                Ok(QueryResult {
                    entries,
                    total_count,
                    has_more: options.offset + returned < total_count,
                    search_time_ms: cached.search_time_ms + persisted.search_time_ms,
                    from_cache: false,
                })
            }
        }
    }

    /// Text search over the persistent tier. A handful of the hottest hits
    /// are copied into the cache for follow-up reads.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn search(&self, options: &SearchOptions) -> Result<QueryResult> {
        self.inner.counters.searches.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let opts = options.clone();
        let result = self
            .run_with_timeout(move || inner.store.lock().search(&opts))
            .await?;

        for record in result.entries.iter().take(MAX_SEARCH_PROMOTIONS) {
            self.promote(record.clone());
        }
        Ok(result)
    }

    fn choose_strategy(&self, filters: &MemoryFilters, options: &QueryOptions) -> QueryStrategy {
        let batch_size = self.inner.config.service.batch_size;
        if !filters.tags.is_empty() || options.limit > batch_size {
            QueryStrategy::Combine
        } else if filters.steam_id.is_some() || filters.session_id.is_some() {
            QueryStrategy::PreferCache
        } else {
            QueryStrategy::PersistentOnly
        }
    }

    async fn persistent_query(
        &self,
        filters: &MemoryFilters,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let inner = Arc::clone(&self.inner);
        let (f, o) = (filters.clone(), options.clone());
        self.run_with_timeout(move || inner.store.lock().query(&f, &o))
            .await
    }

    /// Run a blocking store operation on the blocking pool under the query
    /// budget. Expiry degrades to an empty result instead of an error so
    /// a slow database never takes coaching offline.
    async fn run_with_timeout(
        &self,
        op: impl FnOnce() -> Result<QueryResult> + Send + 'static,
    ) -> Result<QueryResult> {
        let budget_ms = self.inner.config.service.query_timeout_ms;
        let budget = StdDuration::from_millis(budget_ms);
        let _guard = self.inner.query_timer.begin();

        let task = tokio::task::spawn_blocking(op);
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CoachMemError::Io(std::io::Error::other(format!(
                "query worker failed: {join_err}"
            )))),
            Err(_elapsed) => {
                let timeout = CoachMemError::QueryTimeout {
                    elapsed_ms: budget_ms,
                    budget_ms,
                };
                warn!(error = %timeout, "persistent query abandoned");
                Ok(QueryResult::empty(budget_ms))
            }
        }
    }

    fn promote(&self, record: MemoryRecord) {
        let id = record.id;
        match self
            .inner
            .short_term
            .store(record, CacheSource::Promotion, &StoreOptions::default())
        {
            Ok(()) => {
                self.inner.tracker.lock().forget(&id);
                self.inner.counters.promotions.fetch_add(1, Ordering::Relaxed);
                self.inner.emit(MemoryEvent::Promoted { id });
                debug!(%id, "promoted into cache");
            }
            Err(e) => {
                // Promotion is an optimization; a full cache just skips it.
                debug!(%id, error = %e, "promotion skipped");
            }
        }
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// A player's profile record: index lookup first, persistent fallback.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn get_player_profile(&self, steam_id: &SteamId) -> Result<Option<MemoryRecord>> {
        if let Some(view) = self.inner.short_term.player_view(steam_id) {
            if let Some(profile_id) = view.profile_id {
                if let Some(record) = self
                    .get(&profile_id, Some(MemoryType::PlayerProfile))
                    .await?
                {
                    return Ok(Some(record));
                }
            }
        }
        let filters = MemoryFilters {
            memory_type: Some(MemoryType::PlayerProfile),
            steam_id: Some(steam_id.clone()),
            ..MemoryFilters::default()
        };
        let options = QueryOptions {
            limit: 1,
            sort_by: SortBy::UpdatedAt,
            ..QueryOptions::default()
        };
        let result = self.persistent_query(&filters, &options).await?;
        Ok(result.entries.into_iter().next())
    }

    /// A player's most recent interactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn get_interaction_history(
        &self,
        steam_id: &SteamId,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let filters = MemoryFilters {
            memory_type: Some(MemoryType::InteractionHistory),
            steam_id: Some(steam_id.clone()),
            ..MemoryFilters::default()
        };
        let options = QueryOptions {
            limit,
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            ..QueryOptions::default()
        };
        Ok(self.query(&filters, &options).await?.entries)
    }

    /// The current data record for a session: index lookup first, then
    /// persistence.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn get_current_session_data(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<MemoryRecord>> {
        if let Some(view) = self.inner.short_term.session_view(session_id) {
            if let Some(data_id) = view.data_id {
                if let Some(record) = self.get(&data_id, Some(MemoryType::SessionData)).await? {
                    return Ok(Some(record));
                }
            }
        }
        let filters = MemoryFilters {
            memory_type: Some(MemoryType::SessionData),
            session_id: Some(session_id.clone()),
            ..MemoryFilters::default()
        };
        let options = QueryOptions {
            limit: 1,
            sort_by: SortBy::UpdatedAt,
            ..QueryOptions::default()
        };
        let result = self.persistent_query(&filters, &options).await?;
        Ok(result.entries.into_iter().next())
    }

    /// Game knowledge for a context key such as `map:de_dust2` or
    /// `situation:retake`. Hits the context index first; otherwise falls
    /// back to a fuzzy search on the key's value.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn get_game_knowledge(
        &self,
        context_key: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        if let Some(view) = self.inner.short_term.context_view(context_key) {
            let mut records = Vec::with_capacity(view.knowledge.len().min(limit));
            for id in view.knowledge.iter().take(limit) {
                if let Some(record) = self.get(id, Some(MemoryType::GameKnowledge)).await? {
                    records.push(record);
                }
            }
            if !records.is_empty() {
                return Ok(records);
            }
        }
        let term = context_key
            .split_once(':')
            .map_or(context_key, |(_, value)| value);
        let result = self
            .search(&SearchOptions {
                term: term.to_string(),
                memory_types: vec![MemoryType::GameKnowledge],
                fuzzy: true,
                limit,
            })
            .await?;
        Ok(result.entries)
    }

    /// A player's coaching insights, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn get_coaching_insights(
        &self,
        steam_id: &SteamId,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let filters = MemoryFilters {
            memory_type: Some(MemoryType::CoachingInsights),
            steam_id: Some(steam_id.clone()),
            ..MemoryFilters::default()
        };
        let options = QueryOptions {
            limit,
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            ..QueryOptions::default()
        };
        Ok(self.query(&filters, &options).await?.entries)
    }

    // ------------------------------------------------------------------
    // Maintenance / status
    // ------------------------------------------------------------------

    /// Sweep expired entries from both tiers now. Returns entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on a persistence failure.
    pub async fn cleanup(&self) -> Result<usize> {
        self.inner.cleanup_both()
    }

    /// Snapshot both tiers and the counters.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] if the persistent counts fail.
    pub async fn status(&self) -> Result<ServiceStatus> {
        let (persistent_entries, persistent_by_type) = {
            let store = self.inner.store.lock();
            (store.entry_count()?, store.counts_by_type()?)
        };
        Ok(ServiceStatus {
            initialized: self.inner.initialized.load(Ordering::SeqCst),
            short_term: self.inner.short_term.stats(),
            persistent_entries,
            persistent_by_type,
            tracked_ids: self.inner.tracker.lock().len(),
            counters: self.inner.counters.snapshot(),
            query_timing: self.inner.query_timer.stats(),
        })
    }
}

impl Drop for MemoryService {
    fn drop(&mut self) {
        // Last clone going away takes the background tasks with it.
        if Arc::strong_count(&self.tasks) == 1 {
            for task in self.tasks.lock().drain(..) {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field(
                "initialized",
                &self.inner.initialized.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}

/// Which records get a cache copy on write: anything important enough, plus
/// the types the coaching loop reads every tick.
fn is_cacheable(record: &MemoryRecord) -> bool {
    matches!(record.importance, Importance::Critical | Importance::High)
        || matches!(
            record.memory_type(),
            MemoryType::SessionData | MemoryType::CoachingInsights | MemoryType::PlayerProfile
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheTierConfig;
    use crate::memory::{GameKnowledge, InteractionHistory, InteractionKind, MemoryPayload};
    use chrono::Duration as ChronoDuration;

    fn steam() -> SteamId {
        SteamId::new("76561198000000001")
    }

    fn interaction(importance: Importance) -> MemoryRecord {
        MemoryRecord::new(
            importance,
            MemoryPayload::InteractionHistory(InteractionHistory::new(
                steam(),
                InteractionKind::Advice,
                "hold the angle",
            )),
        )
    }

    #[test]
    fn tracker_counts_and_forgets() {
        let mut tracker = AccessTracker::default();
        let id = MemoryId::new();
        assert_eq!(tracker.record(id), 1);
        assert_eq!(tracker.record(id), 2);
        tracker.forget(&id);
        assert_eq!(tracker.record(id), 1);
    }

    #[test]
    fn tracker_prune_keeps_most_counted() {
        let mut tracker = AccessTracker::default();
        let hot = MemoryId::new();
        for _ in 0..5 {
            tracker.record(hot);
        }
        for _ in 0..10 {
            tracker.record(MemoryId::new());
        }
        assert_eq!(tracker.prune(3), 8);
        assert_eq!(tracker.len(), 3);
        // The hot id survived, so its count keeps growing.
        assert_eq!(tracker.record(hot), 6);
    }

    #[test]
    fn cacheable_policy_covers_importance_and_type() {
        assert!(is_cacheable(&interaction(Importance::Critical)));
        assert!(is_cacheable(&interaction(Importance::High)));
        assert!(!is_cacheable(&interaction(Importance::Low)));

        // Low-importance knowledge is also skipped.
        let knowledge = MemoryRecord::new(
            Importance::Low,
            MemoryPayload::GameKnowledge(GameKnowledge::new(
                "Smokes",
                "standard smokes for mid",
                "guide",
            )),
        );
        assert!(!is_cacheable(&knowledge));

        // Session-critical types are cached regardless of importance.
        let insight = MemoryRecord::new(
            Importance::Temporary,
            MemoryPayload::CoachingInsights(crate::memory::CoachingInsight::new(
                steam(),
                "aim",
                "crosshair placement drifts low",
                0.7,
            )),
        );
        assert!(is_cacheable(&insight));
    }

    #[test]
    fn strategy_selection() {
        let service = MemoryService::in_memory(CoachMemConfig::default()).expect("service");
        let options = QueryOptions::default();

        let tagged = MemoryFilters {
            tags: vec!["clutch".to_string()],
            ..MemoryFilters::default()
        };
        assert_eq!(
            service.choose_strategy(&tagged, &options),
            QueryStrategy::Combine
        );

        let wide = QueryOptions {
            limit: 500,
            ..QueryOptions::default()
        };
        assert_eq!(
            service.choose_strategy(&MemoryFilters::default(), &wide),
            QueryStrategy::Combine
        );

        let scoped = MemoryFilters {
            steam_id: Some(steam()),
            ..MemoryFilters::default()
        };
        assert_eq!(
            service.choose_strategy(&scoped, &options),
            QueryStrategy::PreferCache
        );

        assert_eq!(
            service.choose_strategy(&MemoryFilters::default(), &options),
            QueryStrategy::PersistentOnly
        );
    }

    #[tokio::test]
    async fn cache_rejection_never_fails_the_write() {
        let mut config = CoachMemConfig::default();
        config.caches.interaction_history = CacheTierConfig {
            max_memory_mb: 0,
            ..CacheTierConfig::default()
        };
        let service = MemoryService::in_memory(config).expect("service");

        // Cacheable, but no tier budget to hold it.
        let id = service
            .store(interaction(Importance::Critical))
            .await
            .expect("write must survive the cache rejection");

        let status = service.status().await.expect("status");
        assert_eq!(status.short_term.total_entries, 0);
        assert_eq!(status.persistent_entries, 1);
        assert!(service.get(&id, None).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn short_term_sweep_runs_on_its_own_interval() {
        let mut config = CoachMemConfig::default();
        config.service.cleanup_interval_ms = 25;
        config.service.service_cleanup_interval_ms = 3_600_000;
        config.service.tracker_optimize_interval_ms = 3_600_000;
        let service = MemoryService::in_memory(config).expect("service");

        let record = interaction(Importance::Critical)
            .with_expiry(Utc::now() + ChronoDuration::milliseconds(30));
        service.store(record).await.expect("store");
        assert_eq!(
            service.status().await.expect("status").short_term.total_entries,
            1
        );

        service.initialize().await.expect("initialize");
        tokio::time::sleep(StdDuration::from_millis(200)).await;

        // The cache-only sweep purged the expired entry; the dual-tier
        // cleanup (an hour out) never ran.
        assert_eq!(
            service.status().await.expect("status").short_term.total_entries,
            0
        );
        service.dispose();
    }

    #[tokio::test]
    async fn low_importance_interactions_skip_the_cache() {
        let service = MemoryService::in_memory(CoachMemConfig::default()).expect("service");
        let record = interaction(Importance::Low);
        let id = service.store(record).await.expect("store");

        let status = service.status().await.expect("status");
        assert_eq!(status.short_term.total_entries, 0);
        assert_eq!(status.persistent_entries, 1);

        // Still readable through the fallthrough path.
        let found = service.get(&id, None).await.expect("get");
        assert!(found.is_some());
        assert_eq!(service.status().await.expect("status").counters.cache_misses, 1);
    }
}
