//! Session Data — the live state of one coaching session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoachMemError, Result};
use crate::types::{SessionId, SteamId};

/// A session-data payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Unique session key — the owning key for the session index.
    pub session_id: SessionId,
    /// The player being coached.
    pub steam_id: SteamId,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session ended; `None` while it is still running.
    pub ended_at: Option<DateTime<Utc>>,
    /// Map being played, if known.
    pub map: Option<String>,
    /// Game mode ("competitive", "deathmatch", ...), if known.
    pub mode: Option<String>,
    /// Accumulated numeric stats (kills, deaths, adr, ...).
    pub stats: HashMap<String, f64>,
    /// End-of-session summary, filled in when the session closes.
    pub summary: Option<String>,
}

impl SessionData {
    /// Open a new session for a player.
    #[must_use]
    pub fn new(session_id: SessionId, steam_id: SteamId, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            steam_id,
            started_at,
            ended_at: None,
            map: None,
            mode: None,
            stats: HashMap::new(),
            summary: None,
        }
    }

    /// Whether the session is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Validate the payload before it reaches either tier.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] if the session or Steam ID is
    /// empty, or the session ends before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.session_id.as_str().is_empty() {
            return Err(CoachMemError::Validation {
                reason: "session data requires a session_id".to_string(),
            });
        }
        if self.steam_id.as_str().is_empty() {
            return Err(CoachMemError::Validation {
                reason: "session data requires a steam_id".to_string(),
            });
        }
        if let Some(ended) = self.ended_at {
            if ended < self.started_at {
                return Err(CoachMemError::Validation {
                    reason: "session ends before it starts".to_string(),
                });
            }
        }
        Ok(())
    }
}
