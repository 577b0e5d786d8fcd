//! # Cache Key Generation
//!
//! ## Purpose
//! Deterministic, collision-resistant keys for logical queries so that
//! semantically identical queries always hit the same cache entry.
//!
//! ## Input/Output Specification
//! - **Input**: topic plus optional free-text context and user info
//! - **Output**: lowercase hex SHA-256 digest over the canonicalized fields

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifying fields of a logical query. Missing optional fields are
/// canonicalized to the empty string before hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheQuery {
    /// Topic (industry) the query is partitioned by
    pub topic: String,
    /// Free-text context, e.g. the caller's startup idea
    pub context: Option<String>,
    /// Free-text caller description
    pub user_info: Option<String>,
}

impl CacheQuery {
    /// Query identified by topic alone (scheduler lookups use this)
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            context: None,
            user_info: None,
        }
    }

    /// Compute the cache key for this query. Pure and deterministic.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        // Field separators keep ("ab", "c") distinct from ("a", "bc")
        hasher.update(self.topic.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.context.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user_info.as_deref().unwrap_or("").as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable() {
        let a = CacheQuery {
            topic: "fintech".into(),
            context: Some("payments".into()),
            user_info: None,
        };
        assert_eq!(a.cache_key(), a.clone().cache_key());
    }

    #[test]
    fn differing_queries_differ() {
        let a = CacheQuery {
            topic: "fintech".into(),
            context: Some("payments".into()),
            user_info: None,
        };
        let b = CacheQuery {
            topic: "fintech".into(),
            context: Some("lending".into()),
            user_info: None,
        };
        let c = CacheQuery::for_topic("healthcare");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn missing_optionals_normalize_to_empty() {
        let explicit = CacheQuery {
            topic: "saas".into(),
            context: Some(String::new()),
            user_info: Some(String::new()),
        };
        assert_eq!(explicit.cache_key(), CacheQuery::for_topic("saas").cache_key());
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = CacheQuery {
            topic: "ab".into(),
            context: Some("c".into()),
            user_info: None,
        };
        let b = CacheQuery {
            topic: "a".into(),
            context: Some("bc".into()),
            user_info: None,
        };
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
