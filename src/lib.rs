//! # Startup Intelligence Cache & Extraction Engine
//!
//! ## Overview
//! This library implements an HTTP service that serves competitor
//! intelligence and market news per industry, fronting an expensive,
//! rate-limited external search provider with a time-bounded persistent
//! cache and turning unstructured search snippets into structured records.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `cache`: deterministic cache keys, the sled-backed record store, and
//!   the news/competitor cache orchestrators
//! - `scheduler`: refresh-tier policy (full discovery vs parameter update)
//! - `extraction`: regex heuristics turning search snippets into records
//! - `provider`: client for the external LLM search provider
//! - `api`: REST endpoints
//! - `config`: configuration management and settings
//! - `errors`: centralized error handling and types
//!
//! ## Data Flow
//! Request → cache read → on miss, provider call → extraction heuristics →
//! atomic cache write → JSON response. On hit the provider is skipped.

// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod provider;
pub mod scheduler;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{IntelError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Competitive threat level, ordered so that comparisons and sorting give
/// the most dangerous competitors first when reversed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Parse a provider-supplied label, falling back to `Medium` on
    /// anything outside the known set.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "LOW" => RiskLevel::Low,
            "MEDIUM" => RiskLevel::Medium,
            "HIGH" => RiskLevel::High,
            "CRITICAL" => RiskLevel::Critical,
            _ => RiskLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

/// Cache bookkeeping for one logical query key within one domain
/// (news or competitors). Created on first successful fetch, overwritten
/// on refresh, deleted by cleanup or invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Deterministic hash of the query's identifying fields; unique
    pub cache_key: String,
    /// Topic (industry) the entry was fetched under
    pub topic: String,
    /// Timestamp of the most recent successful provider call for this key
    pub last_fetch_at: DateTime<Utc>,
    /// Timestamp after which the associated content rows are stale
    pub expires_at: DateTime<Utc>,
    /// Number of content rows produced by the last fetch
    pub result_count: usize,
}

/// A cached news article. Deduplicated by `url` regardless of which query
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub url: String,
    pub date: String,
    pub snippet: Option<String>,
    /// Why this article matters for the caller's context
    pub relevance: String,
    /// Category tag (Funding, Market Analysis, Risk Alert, ...)
    pub tag: String,
    pub topic: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cached competitor profile. Deduplicated by `name` regardless of which
/// query produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub topic: String,
    pub founded_year: Option<u16>,
    /// Bucketed headcount ("50+", "100+", "500+", "1000+", "10000+")
    pub employee_count: Option<String>,
    /// Most recent funding round label
    pub last_funding: Option<String>,
    pub funding_amount: Option<String>,
    pub valuation: Option<String>,
    pub recent_news: Option<String>,
    pub risk_level: RiskLevel,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parsed news item before it enters the cache (no id/timestamps yet)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSeed {
    pub title: String,
    pub url: String,
    pub date: String,
    pub snippet: Option<String>,
    pub relevance: String,
    pub tag: String,
}

/// Parsed competitor before it enters the cache (no id/timestamps yet)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetitorSeed {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub founded_year: Option<u16>,
    pub employee_count: Option<String>,
    pub last_funding: Option<String>,
    pub funding_amount: Option<String>,
    pub valuation: Option<String>,
    pub recent_news: Option<String>,
    pub risk_level: RiskLevel,
}

/// Application state shared across API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub store: Arc<cache::CacheStore>,
    pub news_cache: Arc<cache::NewsCache>,
    pub competitor_cache: Arc<cache::CompetitorCache>,
    pub scheduler: Arc<scheduler::RefreshScheduler>,
    pub provider: Arc<dyn provider::SearchProvider>,
    pub extractor: Arc<extraction::Extractor>,
}
