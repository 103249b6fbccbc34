//! Query and search request/response types shared by both tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::MemoryRecord;
use crate::types::{Importance, MemoryType, SessionId, SteamId};

/// Filter predicates for `query`. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    /// Restrict to one memory type.
    pub memory_type: Option<MemoryType>,
    /// Restrict to records owned by this player.
    pub steam_id: Option<SteamId>,
    /// Restrict to records owned by this session.
    pub session_id: Option<SessionId>,
    /// Restrict to records carrying at least one of these tags.
    pub tags: Vec<String>,
    /// Restrict to one importance level.
    pub importance: Option<Importance>,
}

impl MemoryFilters {
    /// Whether a record passes all set predicates at `now`.
    #[must_use]
    pub fn matches(&self, record: &MemoryRecord, now: DateTime<Utc>, include_expired: bool) -> bool {
        if !include_expired && record.is_expired(now) {
            return false;
        }
        if let Some(ty) = self.memory_type {
            if record.memory_type() != ty {
                return false;
            }
        }
        if let Some(ref steam_id) = self.steam_id {
            if record.payload.steam_id() != Some(steam_id) {
                return false;
            }
        }
        if let Some(ref session_id) = self.session_id {
            if record.payload.session_id() != Some(session_id) {
                return false;
            }
        }
        if let Some(importance) = self.importance {
            if record.importance != importance {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| record.tags.contains(t)) {
            return false;
        }
        true
    }
}

/// Sort key for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Last-update time.
    UpdatedAt,
    /// Importance rank.
    Importance,
    /// Cache priority score. Falls back to `UpdatedAt` on the persistent
    /// tier, which has no live priority.
    Priority,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

/// Pagination and ordering options for `query`.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum entries to return.
    pub limit: usize,
    /// Entries to skip before the first returned one.
    pub offset: usize,
    /// Sort key.
    pub sort_by: SortBy,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Whether expired entries are visible to this query.
    pub include_expired: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            include_expired: false,
        }
    }
}

/// Options for `search` — substring match over the persistent tier's known
/// text columns.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Term to match.
    pub term: String,
    /// Types to search; empty means all five.
    pub memory_types: Vec<MemoryType>,
    /// Wildcard-wrap the term for fuzzy substring matching.
    pub fuzzy: bool,
    /// Maximum entries to return.
    pub limit: usize,
}

impl SearchOptions {
    /// Search all types for `term` with fuzzy matching.
    pub fn fuzzy(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            memory_types: Vec::new(),
            fuzzy: true,
            limit: 50,
        }
    }
}

/// Result envelope shared by `query` and `search`.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Matching records, sorted and paginated.
    pub entries: Vec<MemoryRecord>,
    /// Total matches before pagination.
    pub total_count: usize,
    /// Whether more matches exist beyond `offset + entries.len()`.
    pub has_more: bool,
    /// Wall-clock time the query took, in milliseconds.
    pub search_time_ms: u64,
    /// Whether the result was served from the cache tier.
    pub from_cache: bool,
}

impl QueryResult {
    /// An empty result carrying only timing metadata (used on timeout).
    #[must_use]
    pub fn empty(search_time_ms: u64) -> Self {
        Self {
            entries: Vec::new(),
            total_count: 0,
            has_more: false,
            search_time_ms,
            from_cache: false,
        }
    }
}

/// Sort a slice of `(sort-key extracted) records` in place per options.
/// Shared by the cache scan and the combined-result merge.
pub(crate) fn sort_records(records: &mut [MemoryRecord], sort_by: SortBy, order: SortOrder) {
    records.sort_by(|a, b| {
        let ord = match sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::UpdatedAt | SortBy::Priority => a.updated_at.cmp(&b.updated_at),
            SortBy::Importance => a.importance.rank().cmp(&b.importance.rank()),
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryPayload, PlayerProfile};
    use chrono::Duration;

    fn record(steam: &str, tags: &[&str], importance: Importance) -> MemoryRecord {
        MemoryRecord::new(
            importance,
            MemoryPayload::PlayerProfile(PlayerProfile::new(SteamId::new(steam), "p")),
        )
        .with_tags(tags.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn empty_filters_match_everything() {
        let filters = MemoryFilters::default();
        let r = record("76561198000000001", &[], Importance::Low);
        assert!(filters.matches(&r, Utc::now(), false));
    }

    #[test]
    fn owner_and_tag_predicates() {
        let filters = MemoryFilters {
            steam_id: Some(SteamId::new("76561198000000001")),
            tags: vec!["vip".to_string(), "smurf".to_string()],
            ..MemoryFilters::default()
        };
        let now = Utc::now();
        assert!(filters.matches(&record("76561198000000001", &["vip"], Importance::Low), now, false));
        assert!(!filters.matches(&record("76561198000000001", &["other"], Importance::Low), now, false));
        assert!(!filters.matches(&record("76561198000000002", &["vip"], Importance::Low), now, false));
    }

    #[test]
    fn expired_records_are_invisible_unless_asked_for() {
        let filters = MemoryFilters::default();
        let now = Utc::now();
        let r = record("76561198000000001", &[], Importance::Low)
            .with_expiry(now - Duration::seconds(1));
        assert!(!filters.matches(&r, now, false));
        assert!(filters.matches(&r, now, true));
    }

    #[test]
    fn sort_by_importance_desc() {
        let mut records = vec![
            record("1", &[], Importance::Low),
            record("2", &[], Importance::Critical),
            record("3", &[], Importance::Medium),
        ];
        sort_records(&mut records, SortBy::Importance, SortOrder::Desc);
        let ranks: Vec<u8> = records.iter().map(|r| r.importance.rank()).collect();
        assert_eq!(ranks, vec![4, 2, 1]);
    }
}
