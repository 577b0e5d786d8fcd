//! # Search Provider Module
//!
//! ## Purpose
//! Client for the external LLM-backed search provider: raw web search with
//! snippets for extraction, and structured chat completions for the
//! parameter-update path.
//!
//! ## Input/Output Specification
//! - **Input**: query strings (capped at 5 per call) and prompt pairs
//! - **Output**: `ProviderSearchResult` batches or raw completion text
//!
//! ## Key Features
//! - `SearchProvider` trait so handlers and tests never depend on the
//!   concrete HTTP client
//! - Request timeout and Bearer auth from configuration
//! - Query builders that translate a topic + user context into search
//!   queries

use crate::config::ProviderConfig;
use crate::errors::{IntelError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One raw search hit from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub date: Option<String>,
}

/// The upstream intelligence source. Implemented by [`PerplexityClient`]
/// in production and by fixtures in tests.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run up to 5 search queries and return the merged results
    async fn search(
        &self,
        queries: &[String],
        max_results: usize,
    ) -> Result<Vec<ProviderSearchResult>>;

    /// Ask the chat model for a structured (JSON) answer
    async fn complete_structured(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    return_snippets: bool,
    country: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ProviderSearchResult>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Perplexity API client
pub struct PerplexityClient {
    client: reqwest::Client,
    config: ProviderConfig,
    api_key: String,
}

impl PerplexityClient {
    /// Build a client from configuration. Fails when no API key is set,
    /// since every call would be rejected upstream anyway.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| IntelError::Config {
                message: "Provider API key is not configured".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| IntelError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    async fn search_one(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ProviderSearchResult>> {
        let url = format!("{}/search", self.config.api_url.trim_end_matches('/'));
        let request = SearchRequest {
            query,
            max_results,
            return_snippets: true,
            country: &self.config.country,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntelError::Provider {
                details: format!("Search request failed with {}: {}", status, body),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| IntelError::ProviderParsing {
                    source_kind: "search".to_string(),
                    details: e.to_string(),
                })?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl SearchProvider for PerplexityClient {
    async fn search(
        &self,
        queries: &[String],
        max_results: usize,
    ) -> Result<Vec<ProviderSearchResult>> {
        let mut results = Vec::new();
        for query in queries.iter().take(5) {
            tracing::debug!(query = %query, "running provider search");
            let batch = self.search_one(query, max_results).await?;
            tracing::debug!(query = %query, hits = batch.len(), "provider search completed");
            results.extend(batch);
        }
        Ok(results)
    }

    async fn complete_structured(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.1,
            max_tokens: 2000,
            top_p: 0.9,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntelError::Provider {
                details: format!("Chat request failed with {}: {}", status, body),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| IntelError::ProviderParsing {
                    source_kind: "chat".to_string(),
                    details: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| IntelError::ProviderParsing {
                source_kind: "chat".to_string(),
                details: "Response contained no choices".to_string(),
            })
    }
}

/// Search queries for market news about a topic, specialized by optional
/// startup context. Capped at 5 queries per refresh.
pub fn build_news_queries(topic: &str, context: Option<&str>) -> Vec<String> {
    let mut queries = vec![
        format!("{} startup news funding", topic),
        format!("{} industry trends 2025", topic),
        format!("{} market competition analysis", topic),
    ];
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        queries.push(format!("{} startups similar to {}", topic, context));
        queries.push(format!("{} competitors news", context));
    }
    queries.truncate(5);
    queries
}

/// Search queries for competitor discovery in a topic. Capped at 5
/// queries per refresh.
pub fn build_competitor_queries(topic: &str, context: Option<&str>) -> Vec<String> {
    let mut queries = vec![
        format!("top {} startups companies", topic),
        format!("{} startup raises funding", topic),
        format!("best {} platforms tools", topic),
        format!("{} company acquisition partnership", topic),
    ];
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        queries.push(format!("companies similar to {}", context));
    }
    queries.truncate(5);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_queries_are_capped_at_five() {
        let queries = build_news_queries("fintech", Some("a payments API for SMBs"));
        assert_eq!(queries.len(), 5);
        assert!(queries[0].contains("fintech"));
    }

    #[test]
    fn competitor_queries_omit_context_when_absent() {
        let queries = build_competitor_queries("fintech", None);
        assert_eq!(queries.len(), 4);
        assert!(queries.iter().all(|q| q.contains("fintech")));
    }

    #[test]
    fn client_requires_api_key() {
        let config = ProviderConfig {
            api_key: None,
            ..ProviderConfig::default()
        };
        assert!(PerplexityClient::new(config).is_err());

        let config = ProviderConfig {
            api_key: Some(String::new()),
            ..ProviderConfig::default()
        };
        assert!(PerplexityClient::new(config).is_err());
    }
}
