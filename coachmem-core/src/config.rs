//! Configuration for the coachmem memory service.
//!
//! Maps directly to `coachmem.toml`; every section has serde defaults so a
//! partial (or absent) file yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::types::MemoryType;

/// Top-level coachmem configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachMemConfig {
    /// Unified-service behavior (promotion, timers, query budget).
    #[serde(default)]
    pub service: ServiceConfig,
    /// Per-type cache tier limits.
    #[serde(default)]
    pub caches: CacheTiersConfig,
    /// Persistent store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl CoachMemConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CoachMemError::Config` if the TOML is invalid or the tier
    /// budgets exceed the global memory cap.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| crate::CoachMemError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field consistency: the per-type byte budgets must fit
    /// under `global_max_memory_mb`.
    ///
    /// # Errors
    /// Returns `CoachMemError::Config` on violation.
    pub fn validate(&self) -> crate::error::Result<()> {
        let total_mb: usize = MemoryType::ALL
            .iter()
            .map(|ty| self.caches.for_type(*ty).max_memory_mb)
            .sum();
        if total_mb > self.service.global_max_memory_mb {
            return Err(crate::CoachMemError::Config(format!(
                "per-type cache budgets total {total_mb}MB, global cap is {}MB",
                self.service.global_max_memory_mb
            )));
        }
        Ok(())
    }
}

/// Unified-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Global cap across all cache containers, in megabytes.
    #[serde(default = "default_100")]
    pub global_max_memory_mb: usize,
    /// Short-term coordinator sweep interval (ms).
    #[serde(default = "default_300_000")]
    pub cleanup_interval_ms: u64,
    /// Unified-service background cleanup interval (ms) — runs both tiers.
    #[serde(default = "default_60_000")]
    pub service_cleanup_interval_ms: u64,
    /// Persistent-tier accesses before an id is promoted into the cache.
    #[serde(default = "default_3")]
    pub promotion_threshold: u32,
    /// Preload strategy: aggressive, conservative, none.
    #[serde(default)]
    pub preload_strategy: PreloadStrategy,
    /// Budget for a persistent-tier query (ms).
    #[serde(default = "default_10_000")]
    pub query_timeout_ms: u64,
    /// Result-size pivot for the combine-results query strategy.
    #[serde(default = "default_50")]
    pub batch_size: usize,
    /// Most-accessed ids the access tracker retains after pruning.
    #[serde(default = "default_100")]
    pub tracker_capacity: usize,
    /// Access-tracker pruning interval (ms).
    #[serde(default = "default_300_000")]
    pub tracker_optimize_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            global_max_memory_mb: 100,
            cleanup_interval_ms: 300_000,
            service_cleanup_interval_ms: 60_000,
            promotion_threshold: 3,
            preload_strategy: PreloadStrategy::default(),
            query_timeout_ms: 10_000,
            batch_size: 50,
            tracker_capacity: 100,
            tracker_optimize_interval_ms: 300_000,
        }
    }
}

/// How eagerly the service warms the cache on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadStrategy {
    /// Preload every cacheable record.
    Aggressive,
    /// Preload critical and high-importance records only.
    #[default]
    Conservative,
    /// Start cold.
    None,
}

/// Limits for one per-type cache container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTierConfig {
    /// Hard cap on entries.
    #[serde(default = "default_200")]
    pub max_entries: usize,
    /// Byte budget in megabytes.
    #[serde(default = "default_10")]
    pub max_memory_mb: usize,
    /// Default TTL (seconds) applied when a record has no expiry.
    #[serde(default = "default_3600")]
    pub default_ttl_secs: u64,
    /// Eviction policy. Only "lru" is implemented; the field exists so a
    /// config written for a future policy still parses.
    #[serde(default = "default_lru")]
    pub eviction_policy: String,
}

impl CacheTierConfig {
    /// Byte budget.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_memory_mb * 1024 * 1024
    }
}

impl Default for CacheTierConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            max_memory_mb: 10,
            default_ttl_secs: 3600,
            eviction_policy: "lru".to_string(),
        }
    }
}

/// One [`CacheTierConfig`] per memory type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTiersConfig {
    /// Player profiles — few, long-lived.
    #[serde(default = "default_profile_tier")]
    pub player_profile: CacheTierConfig,
    /// Interactions — many, short-lived.
    #[serde(default = "default_interaction_tier")]
    pub interaction_history: CacheTierConfig,
    /// Game knowledge — medium churn.
    #[serde(default = "default_knowledge_tier")]
    pub game_knowledge: CacheTierConfig,
    /// Session state — few, hot.
    #[serde(default = "default_session_tier")]
    pub session_data: CacheTierConfig,
    /// Insights — medium.
    #[serde(default = "default_insight_tier")]
    pub coaching_insights: CacheTierConfig,
}

impl CacheTiersConfig {
    /// The tier config for a memory type.
    #[must_use]
    pub fn for_type(&self, ty: MemoryType) -> &CacheTierConfig {
        match ty {
            MemoryType::PlayerProfile => &self.player_profile,
            MemoryType::InteractionHistory => &self.interaction_history,
            MemoryType::GameKnowledge => &self.game_knowledge,
            MemoryType::SessionData => &self.session_data,
            MemoryType::CoachingInsights => &self.coaching_insights,
        }
    }
}

impl Default for CacheTiersConfig {
    fn default() -> Self {
        Self {
            player_profile: default_profile_tier(),
            interaction_history: default_interaction_tier(),
            game_knowledge: default_knowledge_tier(),
            session_data: default_session_tier(),
            coaching_insights: default_insight_tier(),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// SQLite busy timeout (ms).
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: "coachmem.db".to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_lru() -> String { "lru".to_string() }
fn default_db_path() -> String { "coachmem.db".to_string() }
fn default_3() -> u32 { 3 }
fn default_10() -> usize { 10 }
fn default_50() -> usize { 50 }
fn default_100() -> usize { 100 }
fn default_200() -> usize { 200 }
fn default_3600() -> u64 { 3600 }
fn default_5000() -> u64 { 5000 }
fn default_10_000() -> u64 { 10_000 }
fn default_60_000() -> u64 { 60_000 }
fn default_300_000() -> u64 { 300_000 }

fn default_profile_tier() -> CacheTierConfig {
    CacheTierConfig {
        max_entries: 200,
        max_memory_mb: 10,
        default_ttl_secs: 24 * 3600,
        eviction_policy: "lru".to_string(),
    }
}

fn default_interaction_tier() -> CacheTierConfig {
    CacheTierConfig {
        max_entries: 500,
        max_memory_mb: 20,
        default_ttl_secs: 3600,
        eviction_policy: "lru".to_string(),
    }
}

fn default_knowledge_tier() -> CacheTierConfig {
    CacheTierConfig {
        max_entries: 300,
        max_memory_mb: 15,
        default_ttl_secs: 12 * 3600,
        eviction_policy: "lru".to_string(),
    }
}

fn default_session_tier() -> CacheTierConfig {
    CacheTierConfig {
        max_entries: 100,
        max_memory_mb: 20,
        default_ttl_secs: 2 * 3600,
        eviction_policy: "lru".to_string(),
    }
}

fn default_insight_tier() -> CacheTierConfig {
    CacheTierConfig {
        max_entries: 200,
        max_memory_mb: 10,
        default_ttl_secs: 6 * 3600,
        eviction_policy: "lru".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoachMemConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.service.promotion_threshold, 3);
        assert_eq!(config.service.query_timeout_ms, 10_000);
        assert_eq!(config.service.batch_size, 50);
        assert_eq!(config.caches.session_data.max_entries, 100);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = CoachMemConfig::from_toml(
            r#"
            [service]
            promotion_threshold = 5

            [caches.session_data]
            max_entries = 42
            "#,
        )
        .expect("parse");
        assert_eq!(config.service.promotion_threshold, 5);
        assert_eq!(config.caches.session_data.max_entries, 42);
        // Untouched sections keep their defaults.
        assert_eq!(config.caches.player_profile.max_entries, 200);
        assert_eq!(config.service.global_max_memory_mb, 100);
    }

    #[test]
    fn oversized_tier_budgets_rejected() {
        let result = CoachMemConfig::from_toml(
            r#"
            [service]
            global_max_memory_mb = 10

            [caches.interaction_history]
            max_memory_mb = 50
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let result = CoachMemConfig::from_toml("caches = 3");
        assert!(matches!(result, Err(crate::CoachMemError::Config(_))));
    }
}
