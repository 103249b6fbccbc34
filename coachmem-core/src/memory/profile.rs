//! Player Profile — who the player is.
//!
//! Long-lived per-player record: skill, play style, strengths and
//! weaknesses the coach has learned across sessions.

use serde::{Deserialize, Serialize};

use crate::error::{CoachMemError, Result};
use crate::types::SteamId;

/// Self-reported or inferred skill bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    /// New to the game.
    Beginner,
    /// Knows the basics, inconsistent execution.
    Intermediate,
    /// Solid fundamentals, working on refinement.
    Advanced,
    /// Competitive-level play.
    Expert,
}

/// A player profile payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// The player's Steam ID — the owning key for the player index.
    pub steam_id: SteamId,
    /// Display name.
    pub name: String,
    /// Skill bracket, if known.
    pub skill_level: Option<SkillLevel>,
    /// Free-form play-style descriptors ("entry fragger", "lurker", ...).
    pub play_style: Vec<String>,
    /// Observed strengths.
    pub strengths: Vec<String>,
    /// Observed weaknesses the coach should work on.
    pub weaknesses: Vec<String>,
    /// Maps the player prefers to queue.
    pub preferred_maps: Vec<String>,
    /// Free-form coach notes.
    pub notes: Option<String>,
}

impl PlayerProfile {
    /// Create a minimal profile for a player.
    pub fn new(steam_id: SteamId, name: impl Into<String>) -> Self {
        Self {
            steam_id,
            name: name.into(),
            skill_level: None,
            play_style: Vec::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            preferred_maps: Vec::new(),
            notes: None,
        }
    }

    /// Validate the payload before it reaches either tier.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the Steam ID or name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.steam_id.as_str().is_empty() {
            return Err(CoachMemError::Validation {
                reason: "player profile requires a steam_id".to_string(),
            });
        }
        if self.name.is_empty() {
            return Err(CoachMemError::Validation {
                reason: "player profile requires a name".to_string(),
            });
        }
        Ok(())
    }
}
