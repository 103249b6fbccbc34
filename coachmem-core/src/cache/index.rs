//! Secondary cache indexes — denormalized, bounded views by owner.
//!
//! Three views: player (Steam ID), session, and context (`map:<x>`-style
//! keys from game knowledge). Each holds memory ids only; the containers
//! stay the single source of cached records. Bounded lists truncate on
//! every update so an index entry can never grow without limit.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

use crate::memory::{MemoryPayload, MemoryRecord};
use crate::types::{MemoryId, SessionId, SteamId};

/// Cap on remembered recent interactions per player.
pub const MAX_RECENT_INTERACTIONS: usize = 10;
/// Cap on active insights per player.
pub const MAX_ACTIVE_INSIGHTS: usize = 5;
/// Cap on insights tracked per session.
pub const MAX_SESSION_INSIGHTS: usize = 10;
/// Cap on knowledge ids tracked per context key.
pub const MAX_CONTEXT_REFS: usize = 20;
/// Owners untouched for longer than this are purged by `prune_stale`.
pub const STALE_AFTER: Duration = Duration::hours(24);

/// Per-player denormalized view.
#[derive(Debug, Clone)]
pub struct PlayerIndexEntry {
    /// The player.
    pub steam_id: SteamId,
    /// The player's cached profile record, if any.
    pub profile_id: Option<MemoryId>,
    /// Most-recent-first interaction ids, capped.
    pub recent_interactions: VecDeque<MemoryId>,
    /// The session the player is currently in, if any.
    pub current_session: Option<SessionId>,
    /// Most-recent-first insight ids, capped.
    pub active_insights: Vec<MemoryId>,
    /// Reads routed through this player.
    pub access_frequency: u32,
    /// Bytes of cache charged to this player.
    pub bytes_used: usize,
    /// Last store or read touching this player.
    pub last_activity: DateTime<Utc>,
}

impl PlayerIndexEntry {
    fn new(steam_id: SteamId, now: DateTime<Utc>) -> Self {
        Self {
            steam_id,
            profile_id: None,
            recent_interactions: VecDeque::new(),
            current_session: None,
            active_insights: Vec::new(),
            access_frequency: 0,
            bytes_used: 0,
            last_activity: now,
        }
    }

    fn references(&self, id: &MemoryId) -> bool {
        self.profile_id.as_ref() == Some(id)
            || self.recent_interactions.contains(id)
            || self.active_insights.contains(id)
    }
}

/// Per-session denormalized view.
#[derive(Debug, Clone)]
pub struct SessionIndexEntry {
    /// The session.
    pub session_id: SessionId,
    /// The player being coached.
    pub steam_id: SteamId,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Whether the session is still running.
    pub active: bool,
    /// The cached session-data record, if any.
    pub data_id: Option<MemoryId>,
    /// Most-recent-first insight ids produced during the session, capped.
    pub insights: Vec<MemoryId>,
    /// Interactions recorded against the session.
    pub interaction_count: u32,
    /// Bytes of cache charged to this session.
    pub bytes_used: usize,
    /// Last store or read touching this session.
    pub last_activity: DateTime<Utc>,
}

impl SessionIndexEntry {
    fn new(session_id: SessionId, steam_id: SteamId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            steam_id,
            started_at: now,
            active: true,
            data_id: None,
            insights: Vec::new(),
            interaction_count: 0,
            bytes_used: 0,
            last_activity: now,
        }
    }

    fn references(&self, id: &MemoryId) -> bool {
        self.data_id.as_ref() == Some(id) || self.insights.contains(id)
    }
}

/// Per-context denormalized view (`map:dust2`, `situation:retake_b`, ...).
#[derive(Debug, Clone)]
pub struct ContextIndexEntry {
    /// The context key.
    pub key: String,
    /// Knowledge ids registered under this key, capped.
    pub knowledge: Vec<MemoryId>,
    /// How many records have ever registered under this key.
    pub ref_count: u32,
    /// Relevance estimate in [0, 1]; rises with use.
    pub relevance: f32,
    /// Last store or read touching this key.
    pub last_used: DateTime<Utc>,
}

impl ContextIndexEntry {
    fn new(key: String, now: DateTime<Utc>) -> Self {
        Self {
            key,
            knowledge: Vec::new(),
            ref_count: 0,
            relevance: 0.5,
            last_used: now,
        }
    }
}

/// The three secondary indexes plus the per-id byte ledger used to keep
/// owner byte totals consistent on removal.
#[derive(Debug, Default)]
pub struct CacheIndexes {
    players: HashMap<SteamId, PlayerIndexEntry>,
    sessions: HashMap<SessionId, SessionIndexEntry>,
    contexts: HashMap<String, ContextIndexEntry>,
    sizes: HashMap<MemoryId, usize>,
}

impl CacheIndexes {
    /// Create empty indexes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly cached record in every applicable index. Ids a
    /// bounded list pushes off its tail settle their byte charge here, so
    /// the owner totals and the size ledger only ever cover listed ids.
    pub fn note_stored(&mut self, record: &MemoryRecord, size_bytes: usize, now: DateTime<Utc>) {
        // A re-store of the same id must not double-count.
        self.remove_id(&record.id);
        self.sizes.insert(record.id, size_bytes);
        let Self {
            players,
            sessions,
            contexts,
            sizes,
        } = self;

        match &record.payload {
            MemoryPayload::PlayerProfile(p) => {
                let entry = player_entry(players, &p.steam_id, now);
                if let Some(old) = entry.profile_id.replace(record.id) {
                    settle(sizes, &mut entry.bytes_used, &old);
                }
                entry.bytes_used += size_bytes;
                entry.last_activity = now;
            }
            MemoryPayload::InteractionHistory(i) => {
                let entry = player_entry(players, &i.steam_id, now);
                entry.recent_interactions.push_front(record.id);
                while entry.recent_interactions.len() > MAX_RECENT_INTERACTIONS {
                    if let Some(dropped) = entry.recent_interactions.pop_back() {
                        settle(sizes, &mut entry.bytes_used, &dropped);
                    }
                }
                entry.bytes_used += size_bytes;
                entry.last_activity = now;
                if let Some(ref session_id) = i.session_id {
                    let entry = session_entry(sessions, session_id, &i.steam_id, now);
                    entry.interaction_count += 1;
                    entry.last_activity = now;
                }
            }
            MemoryPayload::SessionData(s) => {
                let entry = session_entry(sessions, &s.session_id, &s.steam_id, now);
                entry.started_at = s.started_at;
                entry.active = s.is_active();
                if let Some(old) = entry.data_id.replace(record.id) {
                    settle(sizes, &mut entry.bytes_used, &old);
                }
                entry.bytes_used += size_bytes;
                entry.last_activity = now;
                let active = s.is_active();
                let session_id = s.session_id.clone();
                let player = player_entry(players, &s.steam_id, now);
                if active {
                    player.current_session = Some(session_id);
                } else if player.current_session.as_ref() == Some(&session_id) {
                    player.current_session = None;
                }
                player.last_activity = now;
            }
            MemoryPayload::CoachingInsights(c) => {
                let entry = player_entry(players, &c.steam_id, now);
                entry.active_insights.insert(0, record.id);
                while entry.active_insights.len() > MAX_ACTIVE_INSIGHTS {
                    if let Some(dropped) = entry.active_insights.pop() {
                        settle(sizes, &mut entry.bytes_used, &dropped);
                    }
                }
                entry.bytes_used += size_bytes;
                entry.last_activity = now;
                if let Some(ref session_id) = c.session_id {
                    // Session insight lists carry no byte charge; the player
                    // side of the same id owns it.
                    let entry = session_entry(sessions, session_id, &c.steam_id, now);
                    entry.insights.insert(0, record.id);
                    entry.insights.truncate(MAX_SESSION_INSIGHTS);
                    entry.last_activity = now;
                }
            }
            MemoryPayload::GameKnowledge(k) => {
                for key in k.context_keys() {
                    let entry = contexts
                        .entry(key.clone())
                        .or_insert_with(|| ContextIndexEntry::new(key, now));
                    entry.knowledge.insert(0, record.id);
                    entry.knowledge.truncate(MAX_CONTEXT_REFS);
                    entry.ref_count += 1;
                    entry.last_used = now;
                }
            }
        }
    }

    /// Register a cache hit: bump owner activity and access frequency.
    pub fn note_access(&mut self, record: &MemoryRecord, now: DateTime<Utc>) {
        if let Some(steam_id) = record.payload.steam_id() {
            if let Some(entry) = self.players.get_mut(steam_id) {
                entry.access_frequency += 1;
                entry.last_activity = now;
            }
        }
        if let Some(session_id) = record.payload.session_id() {
            if let Some(entry) = self.sessions.get_mut(session_id) {
                entry.last_activity = now;
            }
        }
        for key in record.payload.context_keys() {
            if let Some(entry) = self.contexts.get_mut(&key) {
                entry.last_used = now;
                entry.relevance = (entry.relevance + 0.05).min(1.0);
            }
        }
    }

    /// Scrub an id from every index and settle the owner byte totals.
    pub fn remove_id(&mut self, id: &MemoryId) {
        let size = self.sizes.remove(id).unwrap_or(0);

        for entry in self.players.values_mut() {
            if entry.references(id) {
                entry.bytes_used = entry.bytes_used.saturating_sub(size);
            }
            if entry.profile_id.as_ref() == Some(id) {
                entry.profile_id = None;
            }
            entry.recent_interactions.retain(|i| i != id);
            entry.active_insights.retain(|i| i != id);
        }
        for entry in self.sessions.values_mut() {
            if entry.references(id) {
                entry.bytes_used = entry.bytes_used.saturating_sub(size);
            }
            if entry.data_id.as_ref() == Some(id) {
                entry.data_id = None;
            }
            entry.insights.retain(|i| i != id);
        }
        for entry in self.contexts.values_mut() {
            if entry.knowledge.contains(id) {
                entry.ref_count = entry.ref_count.saturating_sub(1);
            }
            entry.knowledge.retain(|i| i != id);
        }
    }

    /// Purge owners inactive beyond the 24h staleness window. Returns how
    /// many index entries went away.
    pub fn prune_stale(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - STALE_AFTER;
        let before = self.players.len() + self.sessions.len() + self.contexts.len();
        self.players.retain(|_, e| e.last_activity >= cutoff);
        self.sessions.retain(|_, e| e.last_activity >= cutoff);
        self.contexts.retain(|_, e| e.last_used >= cutoff);
        before - (self.players.len() + self.sessions.len() + self.contexts.len())
    }

    /// Look up a player's view.
    #[must_use]
    pub fn player(&self, steam_id: &SteamId) -> Option<&PlayerIndexEntry> {
        self.players.get(steam_id)
    }

    /// Look up a session's view.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<&SessionIndexEntry> {
        self.sessions.get(session_id)
    }

    /// Look up a context key's view.
    #[must_use]
    pub fn context(&self, key: &str) -> Option<&ContextIndexEntry> {
        self.contexts.get(key)
    }

    /// Whether any index still references `id`.
    #[must_use]
    pub fn references(&self, id: &MemoryId) -> bool {
        self.players.values().any(|e| e.references(id))
            || self.sessions.values().any(|e| e.references(id))
            || self.contexts.values().any(|e| e.knowledge.contains(id))
    }

}

fn player_entry<'a>(
    players: &'a mut HashMap<SteamId, PlayerIndexEntry>,
    steam_id: &SteamId,
    now: DateTime<Utc>,
) -> &'a mut PlayerIndexEntry {
    players
        .entry(steam_id.clone())
        .or_insert_with(|| PlayerIndexEntry::new(steam_id.clone(), now))
}

fn session_entry<'a>(
    sessions: &'a mut HashMap<SessionId, SessionIndexEntry>,
    session_id: &SessionId,
    steam_id: &SteamId,
    now: DateTime<Utc>,
) -> &'a mut SessionIndexEntry {
    sessions
        .entry(session_id.clone())
        .or_insert_with(|| SessionIndexEntry::new(session_id.clone(), steam_id.clone(), now))
}

/// Release one id's byte charge from an owner total and the size ledger.
fn settle(sizes: &mut HashMap<MemoryId, usize>, bytes_used: &mut usize, id: &MemoryId) {
    let size = sizes.remove(id).unwrap_or(0);
    *bytes_used = bytes_used.saturating_sub(size);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        CoachingInsight, GameKnowledge, InteractionHistory, InteractionKind, MemoryPayload,
        PlayerProfile, SessionData,
    };
    use crate::types::Importance;

    fn steam() -> SteamId {
        SteamId::new("76561198000000001")
    }

    fn interaction(n: u32) -> MemoryRecord {
        MemoryRecord::new(
            Importance::Low,
            MemoryPayload::InteractionHistory(InteractionHistory::new(
                steam(),
                InteractionKind::Advice,
                format!("advice #{n}"),
            )),
        )
    }

    #[test]
    fn profile_registers_under_player() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let record = MemoryRecord::new(
            Importance::High,
            MemoryPayload::PlayerProfile(PlayerProfile::new(steam(), "player_one")),
        );
        idx.note_stored(&record, 512, now);

        let entry = idx.player(&steam()).expect("indexed");
        assert_eq!(entry.profile_id, Some(record.id));
        assert_eq!(entry.bytes_used, 512);
    }

    #[test]
    fn recent_interactions_truncate_at_cap() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let mut last_id = None;
        for n in 0..(MAX_RECENT_INTERACTIONS as u32 + 5) {
            let record = interaction(n);
            last_id = Some(record.id);
            idx.note_stored(&record, 100, now);
        }
        let entry = idx.player(&steam()).expect("indexed");
        assert_eq!(entry.recent_interactions.len(), MAX_RECENT_INTERACTIONS);
        assert_eq!(entry.recent_interactions.front(), last_id.as_ref());
    }

    #[test]
    fn session_tracks_data_and_insights() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let session_id = SessionId::new("s-1");

        let data = MemoryRecord::new(
            Importance::High,
            MemoryPayload::SessionData(SessionData::new(session_id.clone(), steam(), now)),
        );
        idx.note_stored(&data, 256, now);

        let insight = MemoryRecord::new(
            Importance::Medium,
            MemoryPayload::CoachingInsights(
                CoachingInsight::new(steam(), "aim", "crosshair too low", 0.9)
                    .with_session(session_id.clone()),
            ),
        );
        idx.note_stored(&insight, 128, now);

        let entry = idx.session(&session_id).expect("indexed");
        assert_eq!(entry.data_id, Some(data.id));
        assert_eq!(entry.insights, vec![insight.id]);
        assert!(entry.active);
        // The player view points at the running session.
        let player = idx.player(&steam()).expect("player");
        assert_eq!(player.current_session, Some(session_id));
    }

    #[test]
    fn knowledge_registers_under_context_keys() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let record = MemoryRecord::new(
            Importance::Medium,
            MemoryPayload::GameKnowledge(
                GameKnowledge::new("xbox smoke", "throw from spawn", "demo_review")
                    .with_map("dust2")
                    .with_situation("t_mid_take"),
            ),
        );
        idx.note_stored(&record, 200, now);

        assert!(idx.context("map:dust2").is_some());
        assert!(idx.context("situation:t_mid_take").is_some());
        assert_eq!(
            idx.context("map:dust2").expect("key").knowledge,
            vec![record.id]
        );
    }

    #[test]
    fn remove_id_scrubs_everywhere_and_settles_bytes() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let a = interaction(1);
        let b = interaction(2);
        idx.note_stored(&a, 300, now);
        idx.note_stored(&b, 200, now);

        idx.remove_id(&a.id);
        assert!(!idx.references(&a.id));
        let entry = idx.player(&steam()).expect("player");
        assert_eq!(entry.bytes_used, 200);
        assert_eq!(entry.recent_interactions.len(), 1);
    }

    #[test]
    fn truncated_interactions_release_their_bytes() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        for n in 0..(MAX_RECENT_INTERACTIONS as u32 + 5) {
            idx.note_stored(&interaction(n), 100, now);
        }

        let entry = idx.player(&steam()).expect("player");
        assert_eq!(entry.recent_interactions.len(), MAX_RECENT_INTERACTIONS);
        // Only the listed ids stay charged; the five truncated ones settled.
        assert_eq!(entry.bytes_used, MAX_RECENT_INTERACTIONS * 100);
    }

    #[test]
    fn replacing_a_profile_releases_the_old_charge() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let old = MemoryRecord::new(
            Importance::High,
            MemoryPayload::PlayerProfile(PlayerProfile::new(steam(), "before")),
        );
        let new = MemoryRecord::new(
            Importance::High,
            MemoryPayload::PlayerProfile(PlayerProfile::new(steam(), "after")),
        );
        idx.note_stored(&old, 400, now);
        idx.note_stored(&new, 250, now);

        let entry = idx.player(&steam()).expect("player");
        assert_eq!(entry.profile_id, Some(new.id));
        assert_eq!(entry.bytes_used, 250);
    }

    #[test]
    fn restore_of_same_id_does_not_double_count() {
        let now = Utc::now();
        let mut idx = CacheIndexes::new();
        let record = interaction(1);
        idx.note_stored(&record, 300, now);
        idx.note_stored(&record, 350, now);

        let entry = idx.player(&steam()).expect("player");
        assert_eq!(entry.bytes_used, 350);
        assert_eq!(entry.recent_interactions.len(), 1);
    }

    #[test]
    fn stale_owners_are_pruned() {
        let then = Utc::now() - Duration::hours(48);
        let mut idx = CacheIndexes::new();
        idx.note_stored(&interaction(1), 100, then);
        assert_eq!(idx.prune_stale(Utc::now()), 1);
        assert!(idx.player(&steam()).is_none());
    }
}
