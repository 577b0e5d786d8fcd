//! # Refresh Scheduling Policy
//!
//! ## Purpose
//! Decides, per topic, whether the next refresh should be an expensive
//! comprehensive discovery or a cheap parameter update, based on elapsed
//! time since the last successful fetch. Timing is advisory: nothing in
//! this module runs in the background; callers (or an external cron) act
//! on the decision.

use crate::cache::{CacheQuery, CompetitorCache};
use crate::config::SchedulerConfig;
use crate::CacheMetadata;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// The two cost/frequency tiers of refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshTier {
    /// Expensive comprehensive search for new competitors
    FullDiscovery,
    /// Cheap incremental refresh of known competitors' parameters
    ParameterUpdate,
}

/// Scheduling report for one topic
#[derive(Debug, Clone, Serialize)]
pub struct TopicSchedule {
    pub topic: String,
    pub next_discovery: DateTime<Utc>,
    pub next_parameter_update: DateTime<Utc>,
    pub needs_discovery: bool,
    pub needs_parameter_update: bool,
}

/// Refresh-tier policy over the competitor cache metadata
pub struct RefreshScheduler {
    cache: Arc<CompetitorCache>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<CompetitorCache>, config: SchedulerConfig) -> Self {
        Self { cache, config }
    }

    /// Which refresh tier is due for the topic right now
    pub fn decide_tier(&self, topic: &str) -> RefreshTier {
        self.decide_tier_at(topic, Utc::now())
    }

    /// Tier decision at an explicit point in time
    pub fn decide_tier_at(&self, topic: &str, now: DateTime<Utc>) -> RefreshTier {
        let metadata = match self.topic_metadata(topic) {
            Some(m) => m,
            // No cache yet (or the read failed and degraded to a miss):
            // the comprehensive search has to run first
            None => return RefreshTier::FullDiscovery,
        };

        if self.interval_elapsed(&metadata, self.config.full_discovery_interval_hours, now) {
            RefreshTier::FullDiscovery
        } else {
            // Covers both "parameter window elapsed" and the safe default;
            // a non-expired discovery window implies the cheaper tier
            RefreshTier::ParameterUpdate
        }
    }

    /// When the topic's next run of the given tier is due. With no cache
    /// metadata the answer is "now": run immediately.
    pub fn next_run_time(&self, topic: &str, tier: RefreshTier) -> DateTime<Utc> {
        self.next_run_time_at(topic, tier, Utc::now())
    }

    /// Next run time relative to an explicit point in time
    pub fn next_run_time_at(
        &self,
        topic: &str,
        tier: RefreshTier,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let interval = match tier {
            RefreshTier::FullDiscovery => self.config.full_discovery_interval_hours,
            RefreshTier::ParameterUpdate => self.config.parameter_update_interval_hours,
        };

        match self.topic_metadata(topic) {
            Some(metadata) => metadata.last_fetch_at + Duration::hours(interval),
            None => now,
        }
    }

    /// Scheduling status for every configured topic
    pub fn schedule_status(&self) -> Vec<TopicSchedule> {
        let now = Utc::now();
        self.config
            .topics
            .iter()
            .map(|topic| {
                let metadata = self.topic_metadata(topic);
                let needs_discovery = metadata
                    .as_ref()
                    .map(|m| {
                        self.interval_elapsed(m, self.config.full_discovery_interval_hours, now)
                    })
                    .unwrap_or(true);
                let needs_parameter_update = metadata
                    .as_ref()
                    .map(|m| {
                        self.interval_elapsed(m, self.config.parameter_update_interval_hours, now)
                    })
                    .unwrap_or(true);

                TopicSchedule {
                    topic: topic.clone(),
                    next_discovery: self.next_run_time_at(topic, RefreshTier::FullDiscovery, now),
                    next_parameter_update: self.next_run_time_at(
                        topic,
                        RefreshTier::ParameterUpdate,
                        now,
                    ),
                    needs_discovery,
                    needs_parameter_update,
                }
            })
            .collect()
    }

    /// Read the topic-level cache metadata, degrading failures to a miss
    fn topic_metadata(&self, topic: &str) -> Option<CacheMetadata> {
        match self.cache.metadata_for(&CacheQuery::for_topic(topic)) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(topic, error = %e, "schedule metadata read failed, treating as due");
                None
            }
        }
    }

    fn interval_elapsed(
        &self,
        metadata: &CacheMetadata,
        interval_hours: i64,
        now: DateTime<Utc>,
    ) -> bool {
        metadata.last_fetch_at + Duration::hours(interval_hours) <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheStore;
    use crate::{CompetitorSeed, RiskLevel};
    use tempfile::TempDir;

    fn test_scheduler() -> (TempDir, Arc<CompetitorCache>, RefreshScheduler) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path().join("db")).unwrap();
        let cache = Arc::new(CompetitorCache::new(&store).unwrap());
        let config = SchedulerConfig {
            full_discovery_interval_hours: 24,
            parameter_update_interval_hours: 2,
            topics: vec!["fintech".to_string()],
        };
        let scheduler = RefreshScheduler::new(cache.clone(), config);
        (dir, cache, scheduler)
    }

    fn seed() -> CompetitorSeed {
        CompetitorSeed {
            name: "Acme".to_string(),
            risk_level: RiskLevel::Medium,
            ..Default::default()
        }
    }

    #[test]
    fn no_metadata_means_full_discovery_now() {
        let (_dir, _cache, scheduler) = test_scheduler();
        assert_eq!(scheduler.decide_tier("fintech"), RefreshTier::FullDiscovery);

        let now = Utc::now();
        let next = scheduler.next_run_time_at("fintech", RefreshTier::FullDiscovery, now);
        assert_eq!(next, now);
    }

    #[test]
    fn stale_discovery_window_selects_full_discovery() {
        let (_dir, cache, scheduler) = test_scheduler();
        cache
            .store(&CacheQuery::for_topic("fintech"), 48, &[seed()])
            .unwrap();

        // 25h elapsed against a 24h discovery interval
        let later = Utc::now() + Duration::hours(25);
        assert_eq!(
            scheduler.decide_tier_at("fintech", later),
            RefreshTier::FullDiscovery
        );
    }

    #[test]
    fn elapsed_parameter_window_selects_parameter_update() {
        let (_dir, cache, scheduler) = test_scheduler();
        cache
            .store(&CacheQuery::for_topic("fintech"), 48, &[seed()])
            .unwrap();

        let later = Utc::now() + Duration::hours(3);
        assert_eq!(
            scheduler.decide_tier_at("fintech", later),
            RefreshTier::ParameterUpdate
        );
    }

    #[test]
    fn fresh_windows_default_to_parameter_update() {
        let (_dir, cache, scheduler) = test_scheduler();
        cache
            .store(&CacheQuery::for_topic("fintech"), 48, &[seed()])
            .unwrap();

        let shortly = Utc::now() + Duration::hours(1);
        assert_eq!(
            scheduler.decide_tier_at("fintech", shortly),
            RefreshTier::ParameterUpdate
        );
    }

    #[test]
    fn next_run_times_follow_last_fetch() {
        let (_dir, cache, scheduler) = test_scheduler();
        cache
            .store(&CacheQuery::for_topic("fintech"), 48, &[seed()])
            .unwrap();

        let metadata = cache
            .metadata_for(&CacheQuery::for_topic("fintech"))
            .unwrap()
            .unwrap();
        let now = Utc::now();

        assert_eq!(
            scheduler.next_run_time_at("fintech", RefreshTier::FullDiscovery, now),
            metadata.last_fetch_at + Duration::hours(24)
        );
        assert_eq!(
            scheduler.next_run_time_at("fintech", RefreshTier::ParameterUpdate, now),
            metadata.last_fetch_at + Duration::hours(2)
        );
    }

    #[test]
    fn schedule_status_reports_every_configured_topic() {
        let (_dir, _cache, scheduler) = test_scheduler();
        let status = scheduler.schedule_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].topic, "fintech");
        assert!(status[0].needs_discovery);
        assert!(status[0].needs_parameter_update);
    }
}
