//! Game Knowledge — what the coach knows about the game.
//!
//! Map/situation knowledge snippets (smokes, default setups, retake
//! patterns). The only payload that feeds the context index: its map,
//! situation and side expand into `map:<x>` / `situation:<x>` / `side:<x>`
//! context keys.

use serde::{Deserialize, Serialize};

use crate::error::{CoachMemError, Result};

/// Which side of the round a knowledge snippet applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Terrorist side.
    T,
    /// Counter-terrorist side.
    Ct,
}

impl Side {
    /// Stable name used in context keys and the persistent schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::T => "t",
            Self::Ct => "ct",
        }
    }
}

/// A game-knowledge payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameKnowledge {
    /// Map the snippet applies to (e.g. `dust2`), if map-specific.
    pub map: Option<String>,
    /// Situation key (e.g. `retake_b`, `eco_round`), if situation-specific.
    pub situation: Option<String>,
    /// Side the snippet applies to, if side-specific.
    pub side: Option<Side>,
    /// Short title.
    pub title: String,
    /// The knowledge itself.
    pub content: String,
    /// Where the snippet came from ("demo_review", "pro_match", ...).
    pub source: String,
    /// Confidence in the snippet, 0.0–1.0.
    pub confidence: f32,
}

impl GameKnowledge {
    /// Create a new knowledge snippet.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            map: None,
            situation: None,
            side: None,
            title: title.into(),
            content: content.into(),
            source: source.into(),
            confidence: 0.5,
        }
    }

    /// Scope the snippet to a map.
    #[must_use]
    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }

    /// Scope the snippet to a situation.
    #[must_use]
    pub fn with_situation(mut self, situation: impl Into<String>) -> Self {
        self.situation = Some(situation.into());
        self
    }

    /// Context keys this snippet registers under in the context index.
    #[must_use]
    pub fn context_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(ref map) = self.map {
            keys.push(format!("map:{map}"));
        }
        if let Some(ref situation) = self.situation {
            keys.push(format!("situation:{situation}"));
        }
        if let Some(side) = self.side {
            keys.push(format!("side:{}", side.as_str()));
        }
        keys
    }

    /// Validate the payload before it reaches either tier.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if title or content is empty,
    /// or the confidence is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() || self.content.is_empty() {
            return Err(CoachMemError::Validation {
                reason: "game knowledge requires a title and content".to_string(),
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
