//! # Cache Subsystem
//!
//! ## Purpose
//! Time-bounded caching in front of the expensive, rate-limited external
//! search provider. A deterministic key generator maps logical queries to
//! cache entries; a sled-backed record store holds content rows keyed by
//! their natural identity; two orchestrators expose the domain-level API.
//!
//! ## Components
//! - `key`: deterministic query → cache-key digest
//! - `store`: generic time-bounded record store with atomic writes
//! - `news`: the `NewsCache` orchestrator
//! - `competitors`: the `CompetitorCache` orchestrator

pub mod competitors;
pub mod key;
pub mod news;
pub mod store;

pub use competitors::{CachedCompetitors, CompetitorCache, CompetitorCacheStats};
pub use key::CacheQuery;
pub use news::{CachedNews, NewsCache, NewsCacheStats};
pub use store::{open_store, CacheRecord, CacheStore};
