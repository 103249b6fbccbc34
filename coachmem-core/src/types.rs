//! Core type definitions for the coachmem memory system.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player's Steam ID (64-bit form, e.g. `76561198000000001`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SteamId(pub String);

impl SteamId {
    /// Wrap a raw Steam ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a coaching session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap a raw session ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Memory Type
// ---------------------------------------------------------------------------

/// The five memory types the core knows about. Each type owns an independent
/// bounded cache container and a type-specific persistent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Long-lived per-player profile (skill, play style, preferences).
    PlayerProfile,
    /// One coach/player exchange (advice given, feedback received).
    InteractionHistory,
    /// Map/situation knowledge snippets the coach can draw on.
    GameKnowledge,
    /// Live state of a single coaching session.
    SessionData,
    /// Generated coaching insights about a player or session.
    CoachingInsights,
}

impl MemoryType {
    /// All memory types in the fixed probe order used when a lookup has no
    /// type hint.
    pub const ALL: [Self; 5] = [
        Self::SessionData,
        Self::PlayerProfile,
        Self::CoachingInsights,
        Self::InteractionHistory,
        Self::GameKnowledge,
    ];

    /// Stable snake_case name used in the persistent schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerProfile => "player_profile",
            Self::InteractionHistory => "interaction_history",
            Self::GameKnowledge => "game_knowledge",
            Self::SessionData => "session_data",
            Self::CoachingInsights => "coaching_insights",
        }
    }

    /// Parse the stable name back into a memory type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player_profile" => Some(Self::PlayerProfile),
            "interaction_history" => Some(Self::InteractionHistory),
            "game_knowledge" => Some(Self::GameKnowledge),
            "session_data" => Some(Self::SessionData),
            "coaching_insights" => Some(Self::CoachingInsights),
            _ => None,
        }
    }

    /// Type weight used by the cache priority score. Session state ranks
    /// highest — losing it mid-session hurts the most.
    #[must_use]
    pub fn weight(self) -> f32 {
        match self {
            Self::SessionData => 1.0,
            Self::CoachingInsights => 0.9,
            Self::PlayerProfile => 0.8,
            Self::InteractionHistory => 0.6,
            Self::GameKnowledge => 0.5,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Importance
// ---------------------------------------------------------------------------

/// Importance of a memory entry. Drives the cacheability policy and the
/// importance factor of the priority score. A `Critical` entry's durable
/// copy is always authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Must never be lost; always cacheable.
    Critical,
    /// High-value; always cacheable.
    High,
    /// Default level.
    Medium,
    /// Low-value; cached only by type policy.
    Low,
    /// Scratch data expected to expire quickly.
    Temporary,
}

impl Importance {
    /// Numeric rank for sorting (higher = more important).
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Temporary => 0,
        }
    }

    /// Weight used by the cache priority score.
    #[must_use]
    pub fn weight(self) -> f32 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.75,
            Self::Medium => 0.5,
            Self::Low => 0.25,
            Self::Temporary => 0.1,
        }
    }

    /// Stable snake_case name used in the persistent schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Temporary => "temporary",
        }
    }

    /// Parse the stable name back into an importance level.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "temporary" => Some(Self::Temporary),
            _ => None,
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Priority Score
// ---------------------------------------------------------------------------

/// Composite score used to rank cache entries for promotion decisions.
/// Baseline eviction stays pure LRU; this score never drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityScore(pub OrderedFloat<f32>);

impl PriorityScore {
    /// Create a priority score from a raw f32.
    #[must_use]
    pub fn new(score: f32) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_through_name() {
        for ty in MemoryType::ALL {
            assert_eq!(MemoryType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(MemoryType::parse("bogus"), None);
    }

    #[test]
    fn importance_rank_orders_levels() {
        assert!(Importance::Critical.rank() > Importance::High.rank());
        assert!(Importance::High.rank() > Importance::Medium.rank());
        assert!(Importance::Medium.rank() > Importance::Low.rank());
        assert!(Importance::Low.rank() > Importance::Temporary.rank());
    }

    #[test]
    fn session_data_has_highest_type_weight() {
        for ty in MemoryType::ALL {
            assert!(MemoryType::SessionData.weight() >= ty.weight());
        }
    }

    #[test]
    fn priority_scores_are_orderable() {
        let a = PriorityScore::new(0.3);
        let b = PriorityScore::new(0.7);
        assert!(b > a);
        assert!((b.value() - 0.7).abs() < f32::EPSILON);
    }
}
