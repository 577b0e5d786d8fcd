//! # News Cache Orchestrator
//!
//! ## Purpose
//! Domain-level cache API for market-news articles: get-if-fresh, atomic
//! store-with-expiry, invalidation, cleanup, and statistics.
//!
//! ## Input/Output Specification
//! - **Input**: cache queries, TTLs, parsed news seeds
//! - **Output**: fresh cached articles with fetch metadata, or a miss

use crate::cache::key::CacheQuery;
use crate::cache::store::{CacheDomain, CacheStore};
use crate::errors::Result;
use crate::{CacheMetadata, NewsArticle, NewsSeed};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A successful cache read
#[derive(Debug, Clone, Serialize)]
pub struct CachedNews {
    pub from_cache: bool,
    pub articles: Vec<NewsArticle>,
    pub total_results: usize,
    pub last_fetch: DateTime<Utc>,
}

/// News cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct NewsCacheStats {
    pub total_articles: usize,
    pub total_cache_entries: usize,
    pub by_topic: HashMap<String, usize>,
    pub oldest_article: Option<DateTime<Utc>>,
    pub newest_article: Option<DateTime<Utc>>,
}

/// Cache orchestrator for news articles
pub struct NewsCache {
    domain: CacheDomain,
}

impl NewsCache {
    pub fn new(store: &CacheStore) -> Result<Self> {
        Ok(Self {
            domain: store.domain("news")?,
        })
    }

    /// Return cached articles for the query if the entry is still fresh.
    /// A hit with zero matching rows is treated as a miss: metadata
    /// without content is not useful.
    pub fn get_cached(&self, query: &CacheQuery, ttl_hours: i64) -> Result<Option<CachedNews>> {
        let now = Utc::now();
        let metadata = match self.domain.metadata(&query.cache_key())? {
            Some(m) => m,
            None => return Ok(None),
        };

        if metadata.expires_at <= now
            || metadata.last_fetch_at + Duration::hours(ttl_hours) <= now
        {
            return Ok(None);
        }

        let mut articles: Vec<NewsArticle> = self.domain.fresh_records(&query.topic, now)?;
        if articles.is_empty() {
            return Ok(None);
        }
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Some(CachedNews {
            from_cache: true,
            articles,
            total_results: metadata.result_count,
            last_fetch: metadata.last_fetch_at,
        }))
    }

    /// Build full article records (ids, timestamps, expiry) from parsed
    /// seeds without touching the store
    pub fn materialize(
        &self,
        query: &CacheQuery,
        ttl_hours: i64,
        seeds: &[NewsSeed],
    ) -> (CacheMetadata, Vec<NewsArticle>) {
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);

        let metadata = CacheMetadata {
            cache_key: query.cache_key(),
            topic: query.topic.clone(),
            last_fetch_at: now,
            expires_at,
            result_count: seeds.len(),
        };

        let articles = seeds
            .iter()
            .map(|seed| NewsArticle {
                id: uuid::Uuid::new_v4().to_string(),
                title: seed.title.clone(),
                url: seed.url.clone(),
                date: seed.date.clone(),
                snippet: seed.snippet.clone(),
                relevance: seed.relevance.clone(),
                tag: seed.tag.clone(),
                topic: query.topic.clone(),
                expires_at,
                created_at: now,
                updated_at: now,
            })
            .collect();

        (metadata, articles)
    }

    /// Store a fetched batch of articles under the query's cache key and
    /// return the stored records. Articles are upserted by URL; the
    /// metadata row and every record write commit together or not at all.
    pub fn store(
        &self,
        query: &CacheQuery,
        ttl_hours: i64,
        seeds: &[NewsSeed],
    ) -> Result<Vec<NewsArticle>> {
        let (metadata, articles) = self.materialize(query, ttl_hours, seeds);
        self.domain.store(&metadata, &articles, metadata.last_fetch_at)?;
        tracing::info!(topic = %query.topic, count = articles.len(), "cached news articles");
        Ok(articles)
    }

    /// Cache metadata for a query, fresh or not
    pub fn metadata_for(&self, query: &CacheQuery) -> Result<Option<CacheMetadata>> {
        self.domain.metadata(&query.cache_key())
    }

    /// Drop everything cached for a topic, forcing the next read to miss
    pub fn invalidate(&self, topic: &str) -> Result<(usize, usize)> {
        self.domain.invalidate::<NewsArticle>(topic)
    }

    /// Delete expired metadata and articles across all topics.
    /// Returns (articles removed, cache entries removed).
    pub fn cleanup_expired(&self) -> Result<(usize, usize)> {
        self.domain.cleanup_expired::<NewsArticle>(Utc::now())
    }

    /// Aggregate counts for the stats endpoint
    pub fn stats(&self) -> Result<NewsCacheStats> {
        let articles: Vec<NewsArticle> = self.domain.all_records()?;
        let by_topic = self.domain.counts_by_topic::<NewsArticle>()?;
        Ok(NewsCacheStats {
            total_articles: self.domain.record_count(),
            total_cache_entries: self.domain.entry_count(),
            by_topic,
            oldest_article: articles.iter().map(|a| a.created_at).min(),
            newest_article: articles.iter().map(|a| a.created_at).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheStore;
    use tempfile::TempDir;

    fn test_cache() -> (TempDir, NewsCache) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path().join("db")).unwrap();
        let cache = NewsCache::new(&store).unwrap();
        (dir, cache)
    }

    fn seeds(n: usize) -> Vec<NewsSeed> {
        (0..n)
            .map(|i| NewsSeed {
                title: format!("Fintech startup {} raises funding", i),
                url: format!("https://example.com/article-{}", i),
                date: "2024-06-01".to_string(),
                snippet: Some("Snippet".to_string()),
                relevance: "Funding activity in similar space".to_string(),
                tag: "Funding".to_string(),
            })
            .collect()
    }

    #[test]
    fn cold_cache_misses() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");
        assert!(cache.get_cached(&query, 12).unwrap().is_none());
    }

    #[test]
    fn warm_cache_returns_stored_articles() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache.store(&query, 12, &seeds(3)).unwrap();
        let hit = cache.get_cached(&query, 12).unwrap().expect("cache hit");

        assert!(hit.from_cache);
        assert_eq!(hit.articles.len(), 3);
        assert_eq!(hit.total_results, 3);
    }

    #[test]
    fn expired_entries_are_never_served() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache.store(&query, -1, &seeds(2)).unwrap();
        assert!(cache.get_cached(&query, 12).unwrap().is_none());
    }

    #[test]
    fn other_topics_do_not_leak_into_a_hit() {
        let (_dir, cache) = test_cache();
        let fintech = CacheQuery::for_topic("fintech");
        let health = CacheQuery::for_topic("healthcare");

        cache.store(&fintech, 12, &seeds(2)).unwrap();
        cache
            .store(
                &health,
                12,
                &[NewsSeed {
                    title: "Healthcare news".to_string(),
                    url: "https://example.com/health".to_string(),
                    date: "2024-06-01".to_string(),
                    snippet: None,
                    relevance: "General market insight".to_string(),
                    tag: "General".to_string(),
                }],
            )
            .unwrap();

        let hit = cache.get_cached(&fintech, 12).unwrap().expect("cache hit");
        assert!(hit.articles.iter().all(|a| a.topic == "fintech"));
    }

    #[test]
    fn cleanup_keeps_only_unexpired_entries() {
        let (_dir, cache) = test_cache();
        let expired = CacheQuery::for_topic("expired-topic");
        let fresh = CacheQuery::for_topic("fresh-topic");

        cache
            .store(
                &expired,
                -1,
                &[NewsSeed {
                    title: "Old".to_string(),
                    url: "https://example.com/old".to_string(),
                    date: "2024-01-01".to_string(),
                    snippet: None,
                    relevance: "General market insight".to_string(),
                    tag: "General".to_string(),
                }],
            )
            .unwrap();
        cache
            .store(
                &fresh,
                12,
                &[NewsSeed {
                    title: "New".to_string(),
                    url: "https://example.com/new".to_string(),
                    date: "2024-06-01".to_string(),
                    snippet: None,
                    relevance: "General market insight".to_string(),
                    tag: "General".to_string(),
                }],
            )
            .unwrap();

        let (articles_removed, entries_removed) = cache.cleanup_expired().unwrap();
        assert_eq!(articles_removed, 1);
        assert_eq!(entries_removed, 1);

        assert!(cache.get_cached(&expired, 12).unwrap().is_none());
        assert!(cache.get_cached(&fresh, 12).unwrap().is_some());
    }

    #[test]
    fn invalidate_forces_a_miss_before_expiry() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache.store(&query, 12, &seeds(2)).unwrap();
        cache.invalidate("fintech").unwrap();
        assert!(cache.get_cached(&query, 12).unwrap().is_none());
    }

    #[test]
    fn stats_report_topic_counts() {
        let (_dir, cache) = test_cache();
        cache
            .store(&CacheQuery::for_topic("fintech"), 12, &seeds(3))
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.total_cache_entries, 1);
        assert_eq!(stats.by_topic.get("fintech"), Some(&3));
        assert!(stats.oldest_article.is_some());
    }
}
