//! # Competitor Cache Orchestrator
//!
//! ## Purpose
//! Domain-level cache API for competitor profiles: get-if-fresh, atomic
//! store-with-expiry, invalidation, cleanup, statistics, and the
//! risk-ranked dashboard query.
//!
//! ## Input/Output Specification
//! - **Input**: cache queries, TTLs, parsed competitor seeds
//! - **Output**: fresh cached profiles ordered by threat, or a miss

use crate::cache::key::CacheQuery;
use crate::cache::store::{CacheDomain, CacheStore};
use crate::errors::Result;
use crate::{CacheMetadata, CompetitorProfile, CompetitorSeed};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A successful cache read
#[derive(Debug, Clone, Serialize)]
pub struct CachedCompetitors {
    pub from_cache: bool,
    pub competitors: Vec<CompetitorProfile>,
    pub total_competitors: usize,
    pub last_fetch: DateTime<Utc>,
}

/// Competitor cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CompetitorCacheStats {
    pub total_competitors: usize,
    pub total_cache_entries: usize,
    pub by_topic: HashMap<String, usize>,
    pub by_risk_level: HashMap<String, usize>,
}

/// Cache orchestrator for competitor profiles
pub struct CompetitorCache {
    domain: CacheDomain,
}

impl CompetitorCache {
    pub fn new(store: &CacheStore) -> Result<Self> {
        Ok(Self {
            domain: store.domain("competitors")?,
        })
    }

    /// Return cached competitors for the query if the entry is still
    /// fresh, ordered highest risk first, most recently updated first
    /// within a tier. A hit with zero matching rows is a miss.
    pub fn get_cached(
        &self,
        query: &CacheQuery,
        ttl_hours: i64,
    ) -> Result<Option<CachedCompetitors>> {
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

        let mut competitors: Vec<CompetitorProfile> =
            self.domain.fresh_records(&query.topic, now)?;
        if competitors.is_empty() {
            return Ok(None);
        }
        competitors.sort_by(|a, b| {
            b.risk_level
                .cmp(&a.risk_level)
                .then(b.updated_at.cmp(&a.updated_at))
        });

        Ok(Some(CachedCompetitors {
            from_cache: true,
            competitors,
            total_competitors: metadata.result_count,
            last_fetch: metadata.last_fetch_at,
        }))
    }

    /// Build full competitor records (ids, timestamps, expiry) from
    /// parsed seeds without touching the store
    pub fn materialize(
        &self,
        query: &CacheQuery,
        ttl_hours: i64,
        seeds: &[CompetitorSeed],
    ) -> (CacheMetadata, Vec<CompetitorProfile>) {
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);

        let metadata = CacheMetadata {
            cache_key: query.cache_key(),
            topic: query.topic.clone(),
            last_fetch_at: now,
            expires_at,
            result_count: seeds.len(),
        };

        let competitors = seeds
            .iter()
            .map(|seed| CompetitorProfile {
                id: uuid::Uuid::new_v4().to_string(),
                name: seed.name.clone(),
                description: seed.description.clone(),
                website: seed.website.clone(),
                topic: query.topic.clone(),
                founded_year: seed.founded_year,
                employee_count: seed.employee_count.clone(),
                last_funding: seed.last_funding.clone(),
                funding_amount: seed.funding_amount.clone(),
                valuation: seed.valuation.clone(),
                recent_news: seed.recent_news.clone(),
                risk_level: seed.risk_level,
                expires_at,
                created_at: now,
                updated_at: now,
            })
            .collect();

        (metadata, competitors)
    }

    /// Store a fetched batch of competitors under the query's cache key
    /// and return the stored records. Profiles are upserted by name:
    /// incoming non-empty fields win over the stored row, risk level
    /// always takes the incoming value, and expiry is refreshed. Metadata
    /// and records commit atomically.
    pub fn store(
        &self,
        query: &CacheQuery,
        ttl_hours: i64,
        seeds: &[CompetitorSeed],
    ) -> Result<Vec<CompetitorProfile>> {
        let (metadata, competitors) = self.materialize(query, ttl_hours, seeds);
        self.domain
            .store(&metadata, &competitors, metadata.last_fetch_at)?;
        tracing::info!(topic = %query.topic, count = competitors.len(), "cached competitors");
        Ok(competitors)
    }

    /// Cache metadata for a query, fresh or not. The scheduler reads this
    /// to compute refresh tiers without loading content rows.
    pub fn metadata_for(&self, query: &CacheQuery) -> Result<Option<CacheMetadata>> {
        self.domain.metadata(&query.cache_key())
    }

    /// Drop everything cached for a topic, forcing the next read to miss
    pub fn invalidate(&self, topic: &str) -> Result<(usize, usize)> {
        self.domain.invalidate::<CompetitorProfile>(topic)
    }

    /// Delete expired metadata and profiles across all topics.
    /// Returns (profiles removed, cache entries removed).
    pub fn cleanup_expired(&self) -> Result<(usize, usize)> {
        self.domain.cleanup_expired::<CompetitorProfile>(Utc::now())
    }

    /// The highest-threat non-expired competitors for a topic
    pub fn top_risky(&self, topic: &str, limit: usize) -> Result<Vec<CompetitorProfile>> {
        let mut competitors: Vec<CompetitorProfile> =
            self.domain.fresh_records(topic, Utc::now())?;
        competitors.sort_by(|a, b| {
            b.risk_level
                .cmp(&a.risk_level)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        competitors.truncate(limit);
        Ok(competitors)
    }

    /// Aggregate counts for the stats endpoint
    pub fn stats(&self) -> Result<CompetitorCacheStats> {
        let competitors: Vec<CompetitorProfile> = self.domain.all_records()?;
        let by_topic = self.domain.counts_by_topic::<CompetitorProfile>()?;

        let mut by_risk_level: HashMap<String, usize> = HashMap::new();
        for profile in &competitors {
            *by_risk_level
                .entry(profile.risk_level.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(CompetitorCacheStats {
            total_competitors: self.domain.record_count(),
            total_cache_entries: self.domain.entry_count(),
            by_topic,
            by_risk_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheStore;
    use crate::RiskLevel;
    use tempfile::TempDir;

    fn test_cache() -> (TempDir, CompetitorCache) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path().join("db")).unwrap();
        let cache = CompetitorCache::new(&store).unwrap();
        (dir, cache)
    }

    fn seed(name: &str, risk: RiskLevel) -> CompetitorSeed {
        CompetitorSeed {
            name: name.to_string(),
            description: Some(format!("{} builds tools", name)),
            risk_level: risk,
            ..Default::default()
        }
    }

    #[test]
    fn store_then_get_returns_exactly_what_was_stored() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache
            .store(
                &query,
                12,
                &[seed("Acme", RiskLevel::Medium), seed("Globex", RiskLevel::Low)],
            )
            .unwrap();

        let hit = cache.get_cached(&query, 12).unwrap().expect("cache hit");
        assert!(hit.from_cache);
        assert_eq!(hit.total_competitors, 2);
        let names: Vec<&str> = hit.competitors.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Acme") && names.contains(&"Globex"));
    }

    #[test]
    fn upsert_merges_by_name() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        let mut first = seed("Acme", RiskLevel::Medium);
        first.funding_amount = Some("$5M".to_string());
        first.website = Some("acme.com".to_string());
        cache.store(&query, 12, &[first]).unwrap();

        // Second sighting: new funding amount, no website
        let mut second = seed("Acme", RiskLevel::High);
        second.funding_amount = Some("$50M".to_string());
        cache.store(&query, 12, &[second]).unwrap();

        let hit = cache.get_cached(&query, 12).unwrap().expect("cache hit");
        assert_eq!(hit.competitors.len(), 1);
        let acme = &hit.competitors[0];
        assert_eq!(acme.funding_amount.as_deref(), Some("$50M"));
        // Missing incoming field filled from the stored row
        assert_eq!(acme.website.as_deref(), Some("acme.com"));
        assert_eq!(acme.risk_level, RiskLevel::High);
    }

    #[test]
    fn hits_are_ordered_highest_risk_first() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache
            .store(
                &query,
                12,
                &[
                    seed("Lowly", RiskLevel::Low),
                    seed("Threat", RiskLevel::Critical),
                    seed("Middling", RiskLevel::Medium),
                ],
            )
            .unwrap();

        let hit = cache.get_cached(&query, 12).unwrap().expect("cache hit");
        assert_eq!(hit.competitors[0].name, "Threat");
        assert_eq!(hit.competitors[2].name, "Lowly");
    }

    #[test]
    fn expired_profiles_are_never_served() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache.store(&query, -1, &[seed("Acme", RiskLevel::High)]).unwrap();
        assert!(cache.get_cached(&query, 12).unwrap().is_none());
        assert!(cache.top_risky("fintech", 5).unwrap().is_empty());
    }

    #[test]
    fn top_risky_is_limited_and_ranked() {
        let (_dir, cache) = test_cache();
        let query = CacheQuery::for_topic("fintech");

        cache
            .store(
                &query,
                12,
                &[
                    seed("A", RiskLevel::Low),
                    seed("B", RiskLevel::Critical),
                    seed("C", RiskLevel::High),
                ],
            )
            .unwrap();

        let top = cache.top_risky("fintech", 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "B");
        assert_eq!(top[1].name, "C");
    }

    #[test]
    fn stats_group_by_risk_level() {
        let (_dir, cache) = test_cache();
        cache
            .store(
                &CacheQuery::for_topic("fintech"),
                12,
                &[
                    seed("A", RiskLevel::Critical),
                    seed("B", RiskLevel::Critical),
                    seed("C", RiskLevel::Low),
                ],
            )
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_competitors, 3);
        assert_eq!(stats.by_risk_level.get("CRITICAL"), Some(&2));
        assert_eq!(stats.by_risk_level.get("LOW"), Some(&1));
        assert_eq!(stats.by_topic.get("fintech"), Some(&3));
    }

    #[test]
    fn invalidate_only_touches_the_given_topic() {
        let (_dir, cache) = test_cache();
        cache
            .store(&CacheQuery::for_topic("fintech"), 12, &[seed("A", RiskLevel::Low)])
            .unwrap();
        cache
            .store(&CacheQuery::for_topic("saas"), 12, &[seed("B", RiskLevel::Low)])
            .unwrap();

        cache.invalidate("fintech").unwrap();
        assert!(cache
            .get_cached(&CacheQuery::for_topic("fintech"), 12)
            .unwrap()
            .is_none());
        assert!(cache
            .get_cached(&CacheQuery::for_topic("saas"), 12)
            .unwrap()
            .is_some());
    }
}
