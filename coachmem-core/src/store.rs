//! SQLite persistence layer — the long-term tier.
//!
//! One generic `entries` table carries identity, lifecycle timestamps, tags
//! and metadata; one table per memory type carries denormalized filter and
//! search columns plus the full payload as JSON in a `data` column (keeps
//! the schema stable across payload changes); a `tags` table backs tag
//! filtering. Every multi-row write goes through one transaction guarded by
//! a depth counter, so composed stores never double-commit: a nested begin
//! is a no-op and only the outermost commit/rollback takes effect.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{CoachMemError, Result};
use crate::memory::{
    CoachingInsight, GameKnowledge, InteractionHistory, MemoryPayload, MemoryRecord, MemoryUpdate,
    PlayerProfile, SessionData,
};
use crate::query::{MemoryFilters, QueryOptions, QueryResult, SearchOptions, SortBy, SortOrder};
use crate::types::{Importance, MemoryId, MemoryType};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entries (
    id          TEXT PRIMARY KEY,
    memory_type TEXT NOT NULL,
    importance  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    expires_at  TEXT,
    tags        TEXT NOT NULL DEFAULT '[]',
    metadata    TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS player_profiles (
    entry_id TEXT PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    steam_id TEXT NOT NULL,
    name     TEXT NOT NULL,
    data     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS interaction_history (
    entry_id   TEXT PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    steam_id   TEXT NOT NULL,
    session_id TEXT,
    content    TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS game_knowledge (
    entry_id  TEXT PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    map       TEXT,
    situation TEXT,
    side      TEXT,
    title     TEXT NOT NULL,
    content   TEXT NOT NULL,
    data      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS session_data (
    entry_id   TEXT PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    steam_id   TEXT NOT NULL,
    summary    TEXT,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS coaching_insights (
    entry_id   TEXT PRIMARY KEY REFERENCES entries(id) ON DELETE CASCADE,
    steam_id   TEXT NOT NULL,
    session_id TEXT,
    category   TEXT NOT NULL,
    insight    TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tags (
    entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    tag      TEXT NOT NULL,
    PRIMARY KEY (entry_id, tag)
);
CREATE INDEX IF NOT EXISTS idx_entries_type    ON entries(memory_type);
CREATE INDEX IF NOT EXISTS idx_entries_expires ON entries(expires_at);
CREATE INDEX IF NOT EXISTS idx_tags_tag        ON tags(tag);
CREATE INDEX IF NOT EXISTS idx_profiles_steam  ON player_profiles(steam_id);
CREATE INDEX IF NOT EXISTS idx_history_steam   ON interaction_history(steam_id);
CREATE INDEX IF NOT EXISTS idx_sessions_steam  ON session_data(steam_id);
CREATE INDEX IF NOT EXISTS idx_insights_steam  ON coaching_insights(steam_id);
";

/// Fixed-width RFC 3339 (microsecond, Z-suffixed) so stored timestamps
/// compare correctly as text.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoachMemError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CoachMemError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| CoachMemError::Serialization(e.to_string()))
}

/// Handle to the open SQLite database holding the long-term tier.
pub struct LongTermStore {
    conn: Connection,
    tx_depth: u32,
    db_path: PathBuf,
}

impl std::fmt::Debug for LongTermStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTermStore")
            .field("db_path", &self.db_path)
            .field("tx_depth", &self.tx_depth)
            .finish_non_exhaustive()
    }
}

impl LongTermStore {
    /// Open (or create) the database at `path`. The schema is created if it
    /// does not exist; WAL mode is enabled per config.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "long-term store opened");
        Ok(Self {
            conn,
            tx_depth: 0,
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            tx_depth: 0,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ------------------------------------------------------------------
    // Transaction depth
    // ------------------------------------------------------------------

    fn begin(&mut self) -> Result<()> {
        if self.tx_depth == 0 {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        }
        self.tx_depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        debug_assert!(self.tx_depth > 0, "commit outside a transaction");
        self.tx_depth = self.tx_depth.saturating_sub(1);
        if self.tx_depth == 0 {
            self.conn.execute_batch("COMMIT;")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        debug_assert!(self.tx_depth > 0, "rollback outside a transaction");
        self.tx_depth = self.tx_depth.saturating_sub(1);
        if self.tx_depth == 0 {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    /// Run `f` inside a transaction. Nested calls share the outermost
    /// transaction; an inner error unwinds the whole thing.
    fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.rollback();
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Insert a record: generic row + type-specific row + one tag row per
    /// tag, all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure; nothing is left
    /// partially written.
    pub fn store(&mut self, record: &MemoryRecord) -> Result<()> {
        let start = Instant::now();
        self.transaction(|s| {
            s.conn.execute(
                "INSERT INTO entries (id, memory_type, importance, created_at, updated_at, expires_at, tags, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.memory_type().as_str(),
                    record.importance.as_str(),
                    fmt_ts(record.created_at),
                    fmt_ts(record.updated_at),
                    record.expires_at.map(fmt_ts),
                    to_json(&record.tags)?,
                    to_json(&record.metadata)?,
                ],
            )?;
            s.insert_type_row(record)?;
            s.insert_tags(record)?;
            Ok(())
        })?;
        debug!(
            id = %record.id,
            memory_type = %record.memory_type(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "stored record"
        );
        Ok(())
    }

    fn insert_type_row(&mut self, record: &MemoryRecord) -> Result<()> {
        let id = record.id.to_string();
        match &record.payload {
            MemoryPayload::PlayerProfile(p) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO player_profiles (entry_id, steam_id, name, data)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, p.steam_id.as_str(), p.name, to_json(p)?],
                )?;
            }
            MemoryPayload::InteractionHistory(i) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO interaction_history (entry_id, steam_id, session_id, content, data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        i.steam_id.as_str(),
                        i.session_id.as_ref().map(|s| s.as_str().to_string()),
                        i.content,
                        to_json(i)?,
                    ],
                )?;
            }
            MemoryPayload::GameKnowledge(k) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO game_knowledge (entry_id, map, situation, side, title, content, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        id,
                        k.map,
                        k.situation,
                        k.side.map(|s| s.as_str()),
                        k.title,
                        k.content,
                        to_json(k)?,
                    ],
                )?;
            }
            MemoryPayload::SessionData(d) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO session_data (entry_id, session_id, steam_id, summary, data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        d.session_id.as_str(),
                        d.steam_id.as_str(),
                        d.summary,
                        to_json(d)?,
                    ],
                )?;
            }
            MemoryPayload::CoachingInsights(c) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO coaching_insights (entry_id, steam_id, session_id, category, insight, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        c.steam_id.as_str(),
                        c.session_id.as_ref().map(|s| s.as_str().to_string()),
                        c.category,
                        c.insight,
                        to_json(c)?,
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn insert_tags(&mut self, record: &MemoryRecord) -> Result<()> {
        let id = record.id.to_string();
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO tags (entry_id, tag) VALUES (?1, ?2)")?;
        for tag in &record.tags {
            stmt.execute(params![id, tag])?;
        }
        Ok(())
    }

    /// Load a record by id, joining the generic and type-specific rows.
    /// An incomplete join — either half missing — reads as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] or
    /// [`CoachMemError::Serialization`] on failure.
    pub fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        let id_str = id.to_string();
        let mut stmt = self.conn.prepare_cached(
            "SELECT memory_type, importance, created_at, updated_at, expires_at, tags, metadata
             FROM entries WHERE id = ?1",
        )?;
        type GenericRow = (String, String, String, String, Option<String>, String, String);
        let row: Option<GenericRow> = stmt
            .query_row(params![id_str], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .optional()?;

        let Some((ty_str, imp_str, created, updated, expires, tags_json, metadata_json)) = row
        else {
            return Ok(None);
        };

        let Some(ty) = MemoryType::parse(&ty_str) else {
            return Err(CoachMemError::Serialization(format!(
                "unknown memory type {ty_str:?} for entry {id}"
            )));
        };
        let Some(payload) = self.load_payload(ty, &id_str)? else {
            // Generic row without its typed half: treat as absent.
            return Ok(None);
        };

        let importance = Importance::parse(&imp_str).ok_or_else(|| {
            CoachMemError::Serialization(format!("unknown importance {imp_str:?} for entry {id}"))
        })?;

        Ok(Some(MemoryRecord {
            id: *id,
            importance,
            created_at: parse_ts(&created)?,
            updated_at: parse_ts(&updated)?,
            expires_at: expires.as_deref().map(parse_ts).transpose()?,
            tags: from_json(&tags_json)?,
            metadata: from_json(&metadata_json)?,
            payload,
        }))
    }

    fn load_payload(&self, ty: MemoryType, id_str: &str) -> Result<Option<MemoryPayload>> {
        let table = type_table(ty);
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT data FROM {table} WHERE entry_id = ?1"))?;
        let data: Option<String> = stmt
            .query_row(params![id_str], |row| row.get(0))
            .optional()?;
        let Some(data) = data else {
            return Ok(None);
        };
        let payload = match ty {
            MemoryType::PlayerProfile => {
                MemoryPayload::PlayerProfile(from_json::<PlayerProfile>(&data)?)
            }
            MemoryType::InteractionHistory => {
                MemoryPayload::InteractionHistory(from_json::<InteractionHistory>(&data)?)
            }
            MemoryType::GameKnowledge => {
                MemoryPayload::GameKnowledge(from_json::<GameKnowledge>(&data)?)
            }
            MemoryType::SessionData => MemoryPayload::SessionData(from_json::<SessionData>(&data)?),
            MemoryType::CoachingInsights => {
                MemoryPayload::CoachingInsights(from_json::<CoachingInsight>(&data)?)
            }
        };
        Ok(Some(payload))
    }

    /// Merge a partial update into a stored record, one transaction.
    /// Returns `Ok(false)` if no such record exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Validation`] on an invalid patch, or
    /// [`CoachMemError::Database`] on failure (fully rolled back).
    pub fn update(&mut self, id: &MemoryId, patch: &MemoryUpdate) -> Result<bool> {
        self.transaction(|s| {
            let Some(mut record) = s.get(id)? else {
                return Ok(false);
            };
            record.apply_update(patch)?;

            s.conn.execute(
                "UPDATE entries SET importance = ?2, updated_at = ?3, expires_at = ?4, tags = ?5, metadata = ?6
                 WHERE id = ?1",
                params![
                    record.id.to_string(),
                    record.importance.as_str(),
                    fmt_ts(record.updated_at),
                    record.expires_at.map(fmt_ts),
                    to_json(&record.tags)?,
                    to_json(&record.metadata)?,
                ],
            )?;
            if patch.tags.is_some() {
                s.conn.execute(
                    "DELETE FROM tags WHERE entry_id = ?1",
                    params![record.id.to_string()],
                )?;
                s.insert_tags(&record)?;
            }
            if patch.payload.is_some() {
                s.insert_type_row(&record)?;
            }
            Ok(true)
        })
    }

    /// Delete a record; the generic, type-specific, and tag rows go in one
    /// cascading transaction. Returns whether a row was actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn delete(&mut self, id: &MemoryId) -> Result<bool> {
        let removed = self.transaction(|s| {
            let n = s
                .conn
                .execute("DELETE FROM entries WHERE id = ?1", params![id.to_string()])?;
            Ok(n > 0)
        })?;
        if removed {
            debug!(%id, "deleted record");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Query / search
    // ------------------------------------------------------------------

    /// Filtered, sorted, paginated query. The total match count rides along
    /// via a window function in the same statement.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn query(&self, filters: &MemoryFilters, options: &QueryOptions) -> Result<QueryResult> {
        let start = Instant::now();
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(ty) = filters.memory_type {
            clauses.push("memory_type = ?".to_string());
            args.push(ty.as_str().to_string());
        }
        if let Some(importance) = filters.importance {
            clauses.push("importance = ?".to_string());
            args.push(importance.as_str().to_string());
        }
        if let Some(ref steam_id) = filters.steam_id {
            clauses.push(
                "id IN (SELECT entry_id FROM player_profiles WHERE steam_id = ?
                  UNION SELECT entry_id FROM interaction_history WHERE steam_id = ?
                  UNION SELECT entry_id FROM session_data WHERE steam_id = ?
                  UNION SELECT entry_id FROM coaching_insights WHERE steam_id = ?)"
                    .to_string(),
            );
            for _ in 0..4 {
                args.push(steam_id.as_str().to_string());
            }
        }
        if let Some(ref session_id) = filters.session_id {
            clauses.push(
                "id IN (SELECT entry_id FROM interaction_history WHERE session_id = ?
                  UNION SELECT entry_id FROM session_data WHERE session_id = ?
                  UNION SELECT entry_id FROM coaching_insights WHERE session_id = ?)"
                    .to_string(),
            );
            for _ in 0..3 {
                args.push(session_id.as_str().to_string());
            }
        }
        if !filters.tags.is_empty() {
            let placeholders = vec!["?"; filters.tags.len()].join(", ");
            clauses.push(format!(
                "id IN (SELECT entry_id FROM tags WHERE tag IN ({placeholders}))"
            ));
            args.extend(filters.tags.iter().cloned());
        }
        if !options.include_expired {
            clauses.push("(expires_at IS NULL OR expires_at > ?)".to_string());
            args.push(fmt_ts(Utc::now()));
        }

        let mut where_sql = String::new();
        if !clauses.is_empty() {
            where_sql.push_str(" WHERE ");
            where_sql.push_str(&clauses.join(" AND "));
        }
        let mut sql = format!("SELECT id, COUNT(*) OVER () AS total FROM entries{where_sql}");
        let order_col = match options.sort_by {
            SortBy::CreatedAt => "created_at",
            SortBy::UpdatedAt | SortBy::Priority => "updated_at",
            SortBy::Importance => {
                "CASE importance
                   WHEN 'critical' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2
                   WHEN 'low' THEN 1 ELSE 0 END"
            }
        };
        let order_dir = match options.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY {order_col} {order_dir} LIMIT {} OFFSET {}",
            options.limit, options.offset
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<(String, i64)> = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        // The window function only rides along on returned rows; a page
        // past the last match still has to report the true match count.
        let total_count = match rows.first() {
            Some((_, total)) => *total as usize,
            None => {
                let count: i64 = self.conn.query_row(
                    &format!("SELECT COUNT(*) FROM entries{where_sql}"),
                    params_from_iter(args.iter()),
                    |row| row.get(0),
                )?;
                count as usize
            }
        };
        let mut entries = Vec::with_capacity(rows.len());
        for (id_str, _) in rows {
            let uuid = Uuid::parse_str(&id_str)
                .map_err(|e| CoachMemError::Serialization(e.to_string()))?;
            if let Some(record) = self.get(&MemoryId(uuid))? {
                entries.push(record);
            }
        }

        let returned = entries.len();
        Ok(QueryResult {
            entries,
            total_count,
            has_more: options.offset + returned < total_count,
            search_time_ms: start.elapsed().as_millis() as u64,
            from_cache: false,
        })
    }

    /// Substring search across the known text columns of each type table.
    /// Fuzzy mode wildcard-wraps the term.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn search(&self, options: &SearchOptions) -> Result<QueryResult> {
        let start = Instant::now();
        let pattern = if options.fuzzy {
            format!("%{}%", options.term)
        } else {
            options.term.clone()
        };
        let types: &[MemoryType] = if options.memory_types.is_empty() {
            &MemoryType::ALL
        } else {
            &options.memory_types
        };

        let now = Utc::now();
        let mut entries: Vec<MemoryRecord> = Vec::new();
        for ty in types {
            let table = type_table(*ty);
            let cols = search_columns(*ty);
            let predicate = cols
                .iter()
                .map(|c| format!("{c} LIKE ?1"))
                .collect::<Vec<_>>()
                .join(" OR ");
            let sql = format!("SELECT entry_id FROM {table} WHERE {predicate}");
            let mut stmt = self.conn.prepare(&sql)?;
            let ids: Vec<String> = stmt
                .query_map(params![pattern], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;
            for id_str in ids {
                let uuid = Uuid::parse_str(&id_str)
                    .map_err(|e| CoachMemError::Serialization(e.to_string()))?;
                if let Some(record) = self.get(&MemoryId(uuid))? {
                    if !record.is_expired(now) {
                        entries.push(record);
                    }
                }
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total_count = entries.len();
        entries.truncate(options.limit);
        let returned = entries.len();
        Ok(QueryResult {
            entries,
            total_count,
            has_more: returned < total_count,
            search_time_ms: start.elapsed().as_millis() as u64,
            from_cache: false,
        })
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Delete every expired record in one cascading statement. Returns how
    /// many records went away.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![fmt_ts(now)],
        )?;
        if removed > 0 {
            debug!(removed, "expired records purged from long-term store");
        }
        Ok(removed)
    }

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Per-type record counts for the status surface.
    ///
    /// # Errors
    ///
    /// Returns [`CoachMemError::Database`] on failure.
    pub fn counts_by_type(&self) -> Result<Vec<(MemoryType, usize)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT memory_type, COUNT(*) FROM entries GROUP BY memory_type")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(ty, n)| MemoryType::parse(&ty).map(|ty| (ty, n as usize)))
            .collect())
    }
}

fn type_table(ty: MemoryType) -> &'static str {
    match ty {
        MemoryType::PlayerProfile => "player_profiles",
        MemoryType::InteractionHistory => "interaction_history",
        MemoryType::GameKnowledge => "game_knowledge",
        MemoryType::SessionData => "session_data",
        MemoryType::CoachingInsights => "coaching_insights",
    }
}

fn search_columns(ty: MemoryType) -> &'static [&'static str] {
    match ty {
        MemoryType::PlayerProfile => &["name"],
        MemoryType::InteractionHistory => &["content"],
        MemoryType::GameKnowledge => &["title", "content"],
        MemoryType::SessionData => &["summary"],
        MemoryType::CoachingInsights => &["category", "insight"],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
