//! Coaching Insights — what the coach has concluded.
//!
//! Generated observations about a player or session ("over-peeks mid on
//! T side", "economy discipline improved"). The decision layer produces
//! them; this core only stores and serves them.

use serde::{Deserialize, Serialize};

use crate::error::{CoachMemError, Result};
use crate::types::{SessionId, SteamId};

/// A coaching-insight payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingInsight {
    /// The player the insight is about.
    pub steam_id: SteamId,
    /// The session that produced the insight, if any.
    pub session_id: Option<SessionId>,
    /// Insight category ("positioning", "economy", "aim", ...).
    pub category: String,
    /// The insight text.
    pub insight: String,
    /// Confidence in the insight, 0.0–1.0.
    pub confidence: f32,
    /// Whether the insight translates into concrete advice.
    pub actionable: bool,
    /// Whether the advice has already been delivered to the player.
    pub applied: bool,
}

impl CoachingInsight {
    /// Create a new insight.
    pub fn new(
        steam_id: SteamId,
        category: impl Into<String>,
        insight: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            steam_id,
            session_id: None,
            category: category.into(),
            insight: insight.into(),
            confidence,
            actionable: false,
            applied: false,
        }
    }

    /// Attach the originating session.
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Validate the payload before it reaches either tier.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the Steam ID, category or
    /// insight text is empty, or the confidence is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.steam_id.as_str().is_empty() {
            return Err(CoachMemError::Validation {
                reason: "insight requires a steam_id".to_string(),
            });
        }
        if self.category.is_empty() || self.insight.is_empty() {
            return Err(CoachMemError::Validation {
                reason: "insight requires a category and text".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoachMemError::Validation {
                reason: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(())
    }
}
