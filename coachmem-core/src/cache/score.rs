//! Multi-factor cache priority score.
//!
//! Score = w₁·Frequency(e) + w₂·Recency(e) + w₃·Importance(e) + w₄·Type(e)
//!
//! Where:
//!   Frequency(e)  = access_count / FREQUENCY_CAP, clamped to 1
//!   Recency(e)    = linear decay to 0 over 24h since last access
//!   Importance(e) = importance weight (critical 1.0 … temporary 0.1)
//!   Type(e)       = type weight (session data highest)
//!
//! The score ranks entries for promotion and status reporting. Baseline
//! eviction is pure LRU and never consults it.

use chrono::{DateTime, Utc};

use super::entry::CacheEntry;
use crate::types::PriorityScore;

/// Weight of the capped access-frequency factor.
pub const W_FREQUENCY: f32 = 0.30;
/// Weight of the 24h recency-decay factor.
pub const W_RECENCY: f32 = 0.25;
/// Weight of the importance factor.
pub const W_IMPORTANCE: f32 = 0.25;
/// Weight of the memory-type factor.
pub const W_TYPE: f32 = 0.20;

/// Accesses at which the frequency factor saturates.
const FREQUENCY_CAP: f32 = 10.0;
/// Window over which the recency factor decays to zero.
const RECENCY_WINDOW_HOURS: f32 = 24.0;

/// Compute the composite priority of a cache entry at `now`, in [0, 1].
#[must_use]
pub fn priority(entry: &CacheEntry, now: DateTime<Utc>) -> f32 {
    let frequency = (entry.access_count as f32 / FREQUENCY_CAP).min(1.0);
    let recency = recency_factor(entry.last_accessed, now);
    let importance = entry.record.importance.weight();
    let type_weight = entry.record.memory_type().weight();

    W_FREQUENCY * frequency + W_RECENCY * recency + W_IMPORTANCE * importance + W_TYPE * type_weight
}

/// Compute the priority as an orderable score.
#[must_use]
pub fn priority_score(entry: &CacheEntry, now: DateTime<Utc>) -> PriorityScore {
    PriorityScore::new(priority(entry, now))
}

/// Linear decay from 1.0 (just accessed) to 0.0 (24h or older).
fn recency_factor(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let elapsed_hours = (now - last_accessed).num_seconds().max(0) as f32 / 3600.0;
    (1.0 - elapsed_hours / RECENCY_WINDOW_HOURS).max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
