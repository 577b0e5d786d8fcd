//! # API Server Module
//!
//! ## Purpose
//! REST API serving cached competitor intelligence and market news, with
//! cache management and scheduling endpoints.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests carrying a topic plus optional startup
//!   context
//! - **Output**: JSON responses flagged with `from_cache`
//!
//! ## Key Features
//! - Cache-first request flow: provider calls only on miss or forced
//!   refresh
//! - Cache read failures degrade to a miss; cache write failures still
//!   return the fetched data
//! - CORS support for web frontends
//! - Bearer-token guarded cleanup endpoint

use crate::cache::CacheQuery;
use crate::errors::{IntelError, Result};
use crate::extraction::parse_structured_competitors;
use crate::provider::{build_competitor_queries, build_news_queries};
use crate::scheduler::RefreshTier;
use crate::utils::{Timer, ValidationUtils};
use crate::{AppState, NewsArticle};
use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Result as ActixResult};
use serde::{Deserialize, Serialize};

const TOPIC_MIN_LEN: usize = 2;
const TOPIC_MAX_LEN: usize = 100;

/// News request payload
#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    pub topic: String,
    pub context: Option<String>,
    pub user_info: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Competitor discovery request payload
#[derive(Debug, Deserialize)]
pub struct CompetitorRequest {
    pub topic: String,
    pub context: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Parameter-update request payload: refresh known competitors without a
/// full discovery pass
#[derive(Debug, Deserialize)]
pub struct ParameterUpdateRequest {
    pub topic: String,
    pub competitor_names: Vec<String>,
}

/// Query string for the top-risky endpoint
#[derive(Debug, Deserialize)]
pub struct TopRiskyQuery {
    pub topic: String,
    pub limit: Option<usize>,
}

/// News response payload
#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub from_cache: bool,
    pub articles: Vec<NewsArticle>,
    pub total_results: usize,
    pub last_fetch: chrono::DateTime<chrono::Utc>,
    /// Markdown digest of the returned articles
    pub analysis: String,
    pub query_time_ms: u64,
}

/// Competitor response payload
#[derive(Debug, Serialize)]
pub struct CompetitorResponse {
    pub from_cache: bool,
    pub competitors: Vec<crate::CompetitorProfile>,
    pub total_competitors: usize,
    pub last_fetch: chrono::DateTime<chrono::Utc>,
    pub refresh_tier: RefreshTier,
    pub query_time_ms: u64,
}

/// API server wrapping shared application state
pub struct ApiServer {
    app_state: AppState,
}

impl ApiServer {
    /// Create new API server
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server
    pub async fn run(self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.app_state.config.server.host, self.app_state.config.server.port
        );
        let enable_cors = self.app_state.config.server.enable_cors;
        let app_state = self.app_state;

        tracing::info!("Starting API server on {}", bind_addr);

        HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(app_state.clone()))
                .route("/news", web::post().to(news_handler))
                .route("/competitors", web::post().to(competitors_handler))
                .route(
                    "/competitors/update-parameters",
                    web::post().to(update_parameters_handler),
                )
                .route("/competitors/top-risky", web::get().to(top_risky_handler))
                .route("/competitors/schedule", web::get().to(schedule_handler))
                .route("/cache/cleanup", web::post().to(cleanup_handler))
                .route("/cache/stats", web::get().to(stats_handler))
                .route("/health", web::get().to(health_handler))
                .route("/", web::get().to(index_handler))
        })
        .bind(&bind_addr)
        .map_err(|e| IntelError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run()
        .await
        .map_err(|e| IntelError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": "Invalid request",
        "message": message,
    }))
}

fn provider_failure(e: &IntelError) -> HttpResponse {
    tracing::error!(category = e.category(), "provider request failed: {}", e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "Upstream provider request failed",
        "message": e.to_string(),
        "category": e.category(),
    }))
}

fn validate_topic(topic: &str) -> Option<String> {
    ValidationUtils::is_valid_topic(topic, TOPIC_MIN_LEN, TOPIC_MAX_LEN)
        .then(|| topic.trim().to_string())
}

/// News endpoint handler
async fn news_handler(
    app_state: web::Data<AppState>,
    request: web::Json<NewsRequest>,
) -> ActixResult<HttpResponse> {
    let timer = Timer::new("news_request");
    let topic = match validate_topic(&request.topic) {
        Some(topic) => topic,
        None => return Ok(bad_request("topic must be 2-100 characters")),
    };

    let query = CacheQuery {
        topic: topic.clone(),
        context: request.context.clone().filter(|c| !c.is_empty()),
        user_info: request.user_info.clone().filter(|u| !u.is_empty()),
    };
    let ttl_hours = app_state.config.cache.news_ttl_hours;

    if !request.force_refresh {
        match app_state.news_cache.get_cached(&query, ttl_hours) {
            Ok(Some(hit)) => {
                tracing::info!(topic = %topic, count = hit.articles.len(), "serving cached news");
                let analysis = analyze_news(&topic, &hit.articles);
                return Ok(HttpResponse::Ok().json(NewsResponse {
                    from_cache: true,
                    total_results: hit.total_results,
                    last_fetch: hit.last_fetch,
                    articles: hit.articles,
                    analysis,
                    query_time_ms: timer.stop(),
                }));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(topic = %topic, "news cache read failed, treating as miss: {}", e);
            }
        }
    }

    let queries = build_news_queries(&topic, query.context.as_deref());
    let results = match app_state
        .provider
        .search(&queries, app_state.config.provider.max_results)
        .await
    {
        Ok(results) => results,
        Err(e) => return Ok(provider_failure(&e)),
    };

    let seeds = app_state
        .extractor
        .parse_news(&results, query.context.as_deref());

    let articles = match app_state.news_cache.store(&query, ttl_hours, &seeds) {
        Ok(articles) => articles,
        Err(e) => {
            tracing::warn!(topic = %topic, "news cache write failed, serving uncached results: {}", e);
            app_state.news_cache.materialize(&query, ttl_hours, &seeds).1
        }
    };

    let analysis = analyze_news(&topic, &articles);
    Ok(HttpResponse::Ok().json(NewsResponse {
        from_cache: false,
        total_results: articles.len(),
        last_fetch: chrono::Utc::now(),
        articles,
        analysis,
        query_time_ms: timer.stop(),
    }))
}

/// Competitor discovery endpoint handler
async fn competitors_handler(
    app_state: web::Data<AppState>,
    request: web::Json<CompetitorRequest>,
) -> ActixResult<HttpResponse> {
    let timer = Timer::new("competitors_request");
    let topic = match validate_topic(&request.topic) {
        Some(topic) => topic,
        None => return Ok(bad_request("topic must be 2-100 characters")),
    };

    let query = CacheQuery {
        topic: topic.clone(),
        context: request.context.clone().filter(|c| !c.is_empty()),
        user_info: None,
    };
    let ttl_hours = app_state.config.cache.competitor_ttl_hours;
    let tier = app_state.scheduler.decide_tier(&topic);

    if !request.force_refresh {
        match app_state.competitor_cache.get_cached(&query, ttl_hours) {
            Ok(Some(hit)) => {
                tracing::info!(
                    topic = %topic,
                    count = hit.competitors.len(),
                    "serving cached competitors"
                );
                return Ok(HttpResponse::Ok().json(CompetitorResponse {
                    from_cache: true,
                    total_competitors: hit.total_competitors,
                    last_fetch: hit.last_fetch,
                    competitors: hit.competitors,
                    refresh_tier: tier,
                    query_time_ms: timer.stop(),
                }));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    "competitor cache read failed, treating as miss: {}",
                    e
                );
            }
        }
    }

    let queries = build_competitor_queries(&topic, query.context.as_deref());
    let results = match app_state
        .provider
        .search(&queries, app_state.config.provider.max_results)
        .await
    {
        Ok(results) => results,
        Err(e) => return Ok(provider_failure(&e)),
    };

    let seeds = app_state.extractor.parse_competitors(&results);

    let competitors = match app_state.competitor_cache.store(&query, ttl_hours, &seeds) {
        Ok(competitors) => competitors,
        Err(e) => {
            tracing::warn!(
                topic = %topic,
                "competitor cache write failed, serving uncached results: {}",
                e
            );
            app_state
                .competitor_cache
                .materialize(&query, ttl_hours, &seeds)
                .1
        }
    };

    Ok(HttpResponse::Ok().json(CompetitorResponse {
        from_cache: false,
        total_competitors: competitors.len(),
        last_fetch: chrono::Utc::now(),
        competitors,
        refresh_tier: tier,
        query_time_ms: timer.stop(),
    }))
}

/// Parameter-update endpoint handler: refresh the given known competitors
/// via a structured chat completion instead of a full discovery search.
/// Results are cached under the short parameter-update TTL.
async fn update_parameters_handler(
    app_state: web::Data<AppState>,
    request: web::Json<ParameterUpdateRequest>,
) -> ActixResult<HttpResponse> {
    let timer = Timer::new("update_parameters_request");
    let topic = match validate_topic(&request.topic) {
        Some(topic) => topic,
        None => return Ok(bad_request("topic must be 2-100 characters")),
    };
    if request.competitor_names.is_empty() {
        return Ok(bad_request("competitor_names must not be empty"));
    }

    let system = "You are a startup intelligence analyst. Respond only with a JSON array, \
                  no prose and no markdown.";
    let prompt = format!(
        "Provide current parameters for these {} companies: {}. Return a JSON array where \
         each element has the fields: name, description, website, foundedYear, employeeCount, \
         lastFunding, fundingAmount, valuation, recentNews, riskLevel (one of LOW, MEDIUM, \
         HIGH, CRITICAL).",
        topic,
        request.competitor_names.join(", ")
    );

    let raw = match app_state.provider.complete_structured(system, &prompt).await {
        Ok(raw) => raw,
        Err(e) => return Ok(provider_failure(&e)),
    };

    let seeds = parse_structured_competitors(&raw);
    if seeds.is_empty() {
        tracing::warn!(topic = %topic, "parameter update produced no parseable competitors");
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "updated": 0,
            "competitors": [],
            "query_time_ms": timer.stop(),
        })));
    }

    let query = CacheQuery::for_topic(topic.clone());
    let ttl_hours = app_state.config.cache.parameter_update_ttl_hours;

    let competitors = match app_state.competitor_cache.store(&query, ttl_hours, &seeds) {
        Ok(competitors) => competitors,
        Err(e) => {
            tracing::warn!(
                topic = %topic,
                "competitor cache write failed, serving uncached results: {}",
                e
            );
            app_state
                .competitor_cache
                .materialize(&query, ttl_hours, &seeds)
                .1
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "updated": competitors.len(),
        "competitors": competitors,
        "query_time_ms": timer.stop(),
    })))
}

/// Top-risky competitors endpoint handler
async fn top_risky_handler(
    app_state: web::Data<AppState>,
    query: web::Query<TopRiskyQuery>,
) -> ActixResult<HttpResponse> {
    let topic = match validate_topic(&query.topic) {
        Some(topic) => topic,
        None => return Ok(bad_request("topic must be 2-100 characters")),
    };
    let limit = query.limit.unwrap_or(5).min(20);

    match app_state.competitor_cache.top_risky(&topic, limit) {
        Ok(competitors) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "topic": topic,
            "competitors": competitors,
        }))),
        Err(e) => {
            tracing::error!(topic = %topic, "top-risky read failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Cache read failed",
                "message": e.to_string(),
            })))
        }
    }
}

/// Refresh schedule endpoint handler
async fn schedule_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let schedules = app_state.scheduler.schedule_status();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "topics": schedules,
        "generated_at": chrono::Utc::now(),
    })))
}

/// Cleanup endpoint handler. Deletes expired rows from both caches;
/// guarded by the internal bearer token.
async fn cleanup_handler(
    app_state: web::Data<AppState>,
    http_request: HttpRequest,
) -> ActixResult<HttpResponse> {
    let authorized = http_request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == app_state.config.server.internal_token)
        .unwrap_or(false);

    if !authorized {
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized",
            "message": "Missing or invalid bearer token",
        })));
    }

    let news = app_state.news_cache.cleanup_expired();
    let competitors = app_state.competitor_cache.cleanup_expired();

    match (news, competitors) {
        (Ok((articles, news_entries)), Ok((profiles, competitor_entries))) => {
            tracing::info!(
                articles,
                profiles,
                "cache cleanup removed expired rows"
            );
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "news": { "records_removed": articles, "entries_removed": news_entries },
                "competitors": {
                    "records_removed": profiles,
                    "entries_removed": competitor_entries,
                },
            })))
        }
        (news, competitors) => {
            let e = news.err().or(competitors.err()).unwrap_or(IntelError::Internal {
                message: "unknown cleanup failure".to_string(),
            });
            tracing::error!("cache cleanup failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Cleanup failed",
                "message": e.to_string(),
            })))
        }
    }
}

/// Statistics endpoint handler
async fn stats_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let news = match app_state.news_cache.stats() {
        Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };
    let competitors = match app_state.competitor_cache.stats() {
        Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "news": news,
        "competitors": competitors,
    })))
}

/// Health check endpoint handler
async fn health_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let store_status = match app_state.store.health_check() {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::error!("store health check failed: {}", e);
            "unhealthy"
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": store_status,
        "version": env!("CARGO_PKG_VERSION"),
        "components": { "cache_store": store_status },
    })))
}

/// Index page handler
async fn index_handler() -> ActixResult<HttpResponse> {
    let html = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Startup Intelligence API</title>
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .header { color: #2c3e50; }
            .endpoint { margin: 20px 0; padding: 15px; background: #f8f9fa; border-radius: 5px; }
            .method { font-weight: bold; color: #27ae60; }
        </style>
    </head>
    <body>
        <h1 class="header">Startup Intelligence API</h1>
        <p>Cached competitor intelligence and market news per industry.</p>

        <h2>Available Endpoints</h2>

        <div class="endpoint">
            <span class="method">POST</span> /news
            <p>Market news for a topic, with optional startup context.</p>
        </div>

        <div class="endpoint">
            <span class="method">POST</span> /competitors
            <p>Competitor discovery for a topic.</p>
        </div>

        <div class="endpoint">
            <span class="method">POST</span> /competitors/update-parameters
            <p>Cheap parameter refresh for known competitors.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /competitors/top-risky?topic=...
            <p>Highest-threat cached competitors for a topic.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /competitors/schedule
            <p>Per-topic refresh schedule and due tiers.</p>
        </div>

        <div class="endpoint">
            <span class="method">GET</span> /cache/stats
            <p>Cache entry and record counts.</p>
        </div>

        <h2>Example News Request</h2>
        <pre>{
  "topic": "fintech",
  "context": "a payments API for small businesses"
}</pre>
    </body>
    </html>
    "#;

    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

/// Markdown digest of a news batch: volume, funding activity, and risk
/// alerts at a glance
fn analyze_news(topic: &str, articles: &[NewsArticle]) -> String {
    if articles.is_empty() {
        return format!("## Market News: {}\n\nNo recent news found.", topic);
    }

    let funding = articles.iter().filter(|a| a.tag == "Funding").count();
    let alerts = articles.iter().filter(|a| a.tag == "Risk Alert").count();

    let mut analysis = format!(
        "## Market News: {}\n\n{} recent articles, {} about funding activity, {} risk alerts.\n\n### Top Headlines\n",
        topic,
        articles.len(),
        funding,
        alerts
    );
    for article in articles.iter().take(5) {
        analysis.push_str(&format!(
            "- **{}** ({}): {}\n",
            article.title, article.tag, article.relevance
        ));
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str, tag: &str) -> NewsArticle {
        NewsArticle {
            id: "id".to_string(),
            title: title.to_string(),
            url: "https://example.com".to_string(),
            date: "2024-06-01".to_string(),
            snippet: None,
            relevance: "Related industry news".to_string(),
            tag: tag.to_string(),
            topic: "fintech".to_string(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn analysis_counts_funding_and_alerts() {
        let articles = vec![
            article("Acme raises $5M", "Funding"),
            article("Beta shuts down", "Risk Alert"),
            article("Industry report", "General"),
        ];
        let analysis = analyze_news("fintech", &articles);
        assert!(analysis.contains("3 recent articles"));
        assert!(analysis.contains("1 about funding activity"));
        assert!(analysis.contains("1 risk alerts"));
        assert!(analysis.contains("Acme raises $5M"));
    }

    #[test]
    fn empty_batch_yields_placeholder_analysis() {
        let analysis = analyze_news("fintech", &[]);
        assert!(analysis.contains("No recent news found"));
    }

    #[test]
    fn topic_validation_bounds() {
        assert!(validate_topic("fintech").is_some());
        assert_eq!(validate_topic("  fintech  ").as_deref(), Some("fintech"));
        assert!(validate_topic("a").is_none());
        assert!(validate_topic("").is_none());
    }
}
