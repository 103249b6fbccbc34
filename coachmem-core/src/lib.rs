//! # CoachMem Core Library
//!
//! Dual-tier memory service for an AI game-coaching agent.
//!
//! Coaching advice is only as good as what the coach remembers, so every
//! piece of state lives in one of five typed memories:
//!
//! - **Player profiles** — who the player is, skill, play style
//! - **Interaction history** — what the coach said and how it landed
//! - **Game knowledge** — map/situation-scoped strategy snippets
//! - **Session data** — the live session the coach is following
//! - **Coaching insights** — observations distilled from play
//!
//! Two tiers back them:
//!
//! - [`cache::ShortTermMemory`] — bounded per-type LRU caches with byte
//!   budgets and secondary indexes for player, session, and context lookups
//! - [`store::LongTermStore`] — transactional SQLite persistence
//!
//! [`MemoryService`] unifies both: reads are cache-first, writes always
//! persist, and frequently-read records get promoted into the cache.
//!
//! ## Performance Contract
//!
//! The service sits in a real-time coaching loop:
//! - Cache hit: < 50μs
//! - Persistent read: < 5ms
//! - Query (combined, 50 entries): < 50ms, hard budget 10s

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod query;
pub mod service;
pub mod store;
pub mod types;

pub use config::CoachMemConfig;
pub use error::{CoachMemError, Result};
pub use memory::{MemoryPayload, MemoryRecord, MemoryUpdate};
pub use query::{MemoryFilters, QueryOptions, QueryResult, SearchOptions};
pub use service::{MemoryEvent, MemoryService, ServiceStatus};
pub use store::LongTermStore;
pub use types::*;
