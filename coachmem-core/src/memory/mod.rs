//! Memory payload definitions and the [`MemoryRecord`] envelope.
//!
//! One file per payload type, joined by the [`MemoryPayload`] tagged union.
//! The union carries the owning Steam/session association in its typed
//! fields, so ownership is read off the variant instead of probing
//! loosely-typed field names at runtime.

pub mod insight;
pub mod interaction;
pub mod knowledge;
pub mod profile;
pub mod session;

pub use insight::CoachingInsight;
pub use interaction::{InteractionHistory, InteractionKind};
pub use knowledge::{GameKnowledge, Side};
pub use profile::{PlayerProfile, SkillLevel};
pub use session::SessionData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoachMemError, Result};
use crate::types::{Importance, MemoryId, MemoryType, SessionId, SteamId};

/// A typed memory payload — exactly one variant per [`MemoryType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryPayload {
    /// A player profile.
    PlayerProfile(PlayerProfile),
    /// A coach/player interaction.
    InteractionHistory(InteractionHistory),
    /// A game-knowledge snippet.
    GameKnowledge(GameKnowledge),
    /// Live session state.
    SessionData(SessionData),
    /// A generated coaching insight.
    CoachingInsights(CoachingInsight),
}

impl MemoryPayload {
    /// Which memory type this payload belongs to.
    #[must_use]
    pub fn memory_type(&self) -> MemoryType {
        match self {
            Self::PlayerProfile(_) => MemoryType::PlayerProfile,
            Self::InteractionHistory(_) => MemoryType::InteractionHistory,
            Self::GameKnowledge(_) => MemoryType::GameKnowledge,
            Self::SessionData(_) => MemoryType::SessionData,
            Self::CoachingInsights(_) => MemoryType::CoachingInsights,
        }
    }

    /// The owning player, if the payload is player-associated.
    #[must_use]
    pub fn steam_id(&self) -> Option<&SteamId> {
        match self {
            Self::PlayerProfile(p) => Some(&p.steam_id),
            Self::InteractionHistory(i) => Some(&i.steam_id),
            Self::SessionData(s) => Some(&s.steam_id),
            Self::CoachingInsights(c) => Some(&c.steam_id),
            Self::GameKnowledge(_) => None,
        }
    }

    /// The owning session, if the payload is session-associated.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::InteractionHistory(i) => i.session_id.as_ref(),
            Self::SessionData(s) => Some(&s.session_id),
            Self::CoachingInsights(c) => c.session_id.as_ref(),
            Self::PlayerProfile(_) | Self::GameKnowledge(_) => None,
        }
    }

    /// Context keys for the context index. Only game knowledge has any.
    #[must_use]
    pub fn context_keys(&self) -> Vec<String> {
        match self {
            Self::GameKnowledge(k) => k.context_keys(),
            _ => Vec::new(),
        }
    }

    /// Validate the payload before any write.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the payload is malformed.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PlayerProfile(p) => p.validate(),
            Self::InteractionHistory(i) => i.validate(),
            Self::GameKnowledge(k) => k.validate(),
            Self::SessionData(s) => s.validate(),
            Self::CoachingInsights(c) => c.validate(),
        }
    }
}

/// The envelope both tiers store: identity, lifecycle timestamps, tags,
/// opaque metadata, and the typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier, generated at creation.
    pub id: MemoryId,
    /// Importance level.
    pub importance: Importance,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
    /// Absolute expiry; `None` means the record never expires on its own.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form tags, queryable on both tiers.
    pub tags: Vec<String>,
    /// Opaque metadata the decision layer can attach.
    pub metadata: HashMap<String, serde_json::Value>,
    /// The typed payload.
    pub payload: MemoryPayload,
}

impl MemoryRecord {
    /// Create a new record with a fresh id and current timestamps.
    #[must_use]
    pub fn new(importance: Importance, payload: MemoryPayload) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            importance,
            created_at: now,
            updated_at: now,
            expires_at: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
            payload,
        }
    }

    /// Attach tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set an absolute expiry.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The memory type, derived from the payload variant.
    #[must_use]
    pub fn memory_type(&self) -> MemoryType {
        self.payload.memory_type()
    }

    /// Whether the record has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Validate the record before any write.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the payload is malformed.
    pub fn validate(&self) -> Result<()> {
        self.payload.validate()
    }

    /// Merge a partial update into the record and refresh `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the patch carries a payload
    /// of a different memory type, or the patched payload fails validation.
    pub fn apply_update(&mut self, patch: &MemoryUpdate) -> Result<()> {
        if let Some(ref payload) = patch.payload {
            if payload.memory_type() != self.memory_type() {
                return Err(CoachMemError::Validation {
                    reason: format!(
                        "update payload is {} but record is {}",
                        payload.memory_type(),
                        self.memory_type()
                    ),
                });
            }
            payload.validate()?;
            self.payload = payload.clone();
        }
        if let Some(importance) = patch.importance {
            self.importance = importance;
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref metadata) = patch.metadata {
            self.metadata = metadata.clone();
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial update applied by `update` on both tiers. `None` fields are left
/// untouched; `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    /// New importance, if changing.
    pub importance: Option<Importance>,
    /// Replacement tag set, if changing.
    pub tags: Option<Vec<String>>,
    /// Replacement metadata map, if changing.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    /// New expiry (`Some(None)` clears it), if changing.
    pub expires_at: Option<Option<DateTime<Utc>>>,
    /// Replacement payload of the same memory type, if changing.
    pub payload: Option<MemoryPayload>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
