//! Interaction History — what the coach and player said.
//!
//! One record per exchange: a piece of advice, an answered question, or
//! feedback the player gave on earlier coaching.

use serde::{Deserialize, Serialize};

use crate::error::{CoachMemError, Result};
use crate::types::{SessionId, SteamId};

/// What kind of exchange an interaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Coach gave unprompted advice.
    Advice,
    /// Player asked, coach answered.
    Question,
    /// Player rated or commented on earlier coaching.
    Feedback,
    /// Coach noted something without telling the player.
    Observation,
}

/// A single coach/player interaction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionHistory {
    /// The player involved.
    pub steam_id: SteamId,
    /// The session the exchange happened in, if any.
    pub session_id: Option<SessionId>,
    /// What kind of exchange this was.
    pub kind: InteractionKind,
    /// What was said to (or asked by) the player.
    pub content: String,
    /// The player's reply, if there was one.
    pub response: Option<String>,
    /// Player feedback score in [-1, 1], if the player rated the exchange.
    pub feedback_score: Option<f32>,
}

impl InteractionHistory {
    /// Create a new interaction record.
    pub fn new(steam_id: SteamId, kind: InteractionKind, content: impl Into<String>) -> Self {
        Self {
            steam_id,
            session_id: None,
            kind,
            content: content.into(),
            response: None,
            feedback_score: None,
        }
    }

    /// Attach the owning session.
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Validate the payload before it reaches either tier.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the Steam ID or content is
    /// empty, or the feedback score is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.steam_id.as_str().is_empty() {
            return Err(CoachMemError::Validation {
                reason: "interaction requires a steam_id".to_string(),
            });
        }
        if self.content.is_empty() {
            return Err(CoachMemError::Validation {
                reason: "interaction requires content".to_string(),
            });
        }
        if let Some(score) = self.feedback_score {
            if !(-1.0..=1.0).contains(&score) {
                return Err(CoachMemError::Validation {
                    reason: format!("feedback_score {score} outside [-1, 1]"),
                });
            }
        }
        Ok(())
    }
}
