//! # Extraction Heuristics Module
//!
//! ## Purpose
//! Pure, stateless text-to-struct heuristics that turn unstructured search
//! result snippets into typed competitor and news fields: company names,
//! risk levels, funding rounds and amounts, valuations, founding years,
//! employee buckets, and websites.
//!
//! ## Input/Output Specification
//! - **Input**: a search result's title + snippet (and URL for websites)
//! - **Output**: best-effort optional fields; a missing or ambiguous
//!   signal yields `None`, never an error
//!
//! ## Key Features
//! - Company-name rules as an explicit ordered priority list
//! - Risk classification evaluated CRITICAL → HIGH → MEDIUM, first hit wins
//! - Independent signals: one failed extraction never blocks the others
//! - Case-insensitive batch deduplication of company names

use crate::errors::{IntelError, Result};
use crate::provider::ProviderSearchResult;
use crate::utils::TextUtils;
use crate::{CompetitorSeed, NewsSeed, RiskLevel};
use chrono::{Datelike, Utc};
use regex::Regex;
use std::collections::HashSet;

/// Keyword tiers for risk classification, evaluated top-down
const CRITICAL_SIGNALS: &[&str] = &["unicorn", "billion", "series c", "series d", "ipo"];
const HIGH_SIGNALS: &[&str] = &[
    "series b",
    "100m",
    "market leader",
    "acquires",
    "acquisition",
    "partnership",
];
const MEDIUM_SIGNALS: &[&str] = &["series a", "funding", "raises", "grows", "expands"];

/// Domains that publish about companies rather than belong to them
const NEWS_AGGREGATOR_DOMAINS: &[&str] = &[
    "techcrunch.com",
    "venturebeat.com",
    "forbes.com",
    "bloomberg.com",
    "businessinsider.com",
    "reuters.com",
    "crunchbase.com",
];

/// Valid company-name length band, in characters
const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 29;

/// A single company-name extraction rule. Rules are tried in order and
/// the first candidate surviving cleanup wins.
struct NameRule {
    name: &'static str,
    pattern: Regex,
}

/// Compiled heuristics shared across requests
pub struct Extractor {
    name_rules: Vec<NameRule>,
    leading_article: Regex,
    trailing_suffix: Regex,
    generic_name: Regex,
    funding_round: Regex,
    funding_amount: Regex,
    valuation: Regex,
    founded_year: Regex,
    employee_count: Regex,
    in_text_domain: Regex,
}

impl Extractor {
    /// Compile all patterns up front
    pub fn new() -> Result<Self> {
        let name_rules = vec![
            (
                "name-before-verb",
                r"^([A-Z][A-Za-z0-9&.\- ]+?)\s+(?:is|has|was|will|announced|launched|raised|founded|offers|provides|builds|creates)\b",
            ),
            (
                "name-before-descriptor",
                r"\b([A-Z][A-Za-z0-9&.\- ]+?)\s+(?:AI|startup|company|platform|software|app|tool|service|Inc|Corp|Ltd|LLC)\b",
            ),
            ("name-before-punctuation", r"^([A-Z][A-Za-z0-9&. ]+?)\s*[:,\-]"),
            (
                "name-in-listing",
                r"(?:^|\s)([A-Z][A-Za-z0-9&. ]{2,25}?)\s+(?:founded|based|headquartered|offers|provides|specializes)\b",
            ),
            (
                "domain-from-url",
                r"(?:https?://)?(?:www\.)?([A-Za-z0-9][A-Za-z0-9\-]{1,61}[A-Za-z0-9])\.(?:com|io|ai|co|net|org)\b",
            ),
        ];

        let name_rules = name_rules
            .into_iter()
            .map(|(name, pattern)| {
                Ok(NameRule {
                    name,
                    pattern: compile(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name_rules,
            leading_article: compile(r"(?i)^(?:the|a)\s+")?,
            trailing_suffix: compile(
                r"(?i)\s+(?:inc|corp|ltd|llc|ai|platform|software|app)\.?$",
            )?,
            generic_name: compile(
                r"(?i)^(?:startup|company|platform|software|app|tool|service|solution|system|product)$",
            )?,
            funding_round: compile(r"(?i)\b(pre-seed|seed|series [a-d])\b")?,
            funding_amount: compile(r"(?i)\$(\d+(?:\.\d+)?)\s*(million|billion|m|b)\b")?,
            valuation: compile(r"(?i)\bvalued at \$(\d+(?:\.\d+)?)\s*(million|billion)\b")?,
            founded_year: compile(r"(?i)\bfounded (?:in )?(\d{4})\b")?,
            employee_count: compile(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+)\s*\+?\s*employees\b")?,
            in_text_domain: compile(
                r"\b([A-Za-z0-9][A-Za-z0-9\-]{1,61}[A-Za-z0-9]\.(?:com|io|ai|co|net|org))\b",
            )?,
        })
    }

    /// Extract a company name from a search result. Returns `None` when
    /// no rule produces a plausible name; the caller must skip the result
    /// rather than fabricate one.
    pub fn extract_company_name(&self, title: &str, snippet: &str) -> Option<String> {
        let content = format!("{} {}", title, snippet);

        for rule in &self.name_rules {
            if let Some(captures) = rule.pattern.captures(&content) {
                if let Some(candidate) = captures.get(1) {
                    if let Some(name) = self.clean_name(candidate.as_str()) {
                        tracing::trace!(rule = rule.name, name = %name, "company name extracted");
                        return Some(name);
                    }
                }
            }
        }

        None
    }

    /// Strip articles and corporate suffixes, then reject generic or
    /// out-of-band candidates
    fn clean_name(&self, candidate: &str) -> Option<String> {
        let mut name = candidate.trim().to_string();
        name = self.leading_article.replace(&name, "").to_string();
        name = self.trailing_suffix.replace(&name, "").to_string();
        let name = name.trim().trim_end_matches(['.', ',']).to_string();

        if self.generic_name.is_match(&name) {
            return None;
        }
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name.len()) {
            return None;
        }
        Some(name)
    }

    /// Classify competitive risk from keyword presence, strongest tier
    /// first. A snippet mentioning both "unicorn" and "series a" is
    /// CRITICAL: the higher tier wins.
    pub fn classify_risk(&self, title: &str, snippet: &str) -> RiskLevel {
        let content = format!("{} {}", title, snippet).to_lowercase();

        let tiers = [
            (RiskLevel::Critical, CRITICAL_SIGNALS),
            (RiskLevel::High, HIGH_SIGNALS),
            (RiskLevel::Medium, MEDIUM_SIGNALS),
        ];
        for (level, signals) in tiers {
            if signals.iter().any(|signal| content.contains(signal)) {
                return level;
            }
        }
        RiskLevel::Low
    }

    /// Funding round label and dollar amount, each optional and
    /// independent
    pub fn extract_funding(&self, title: &str, snippet: &str) -> (Option<String>, Option<String>) {
        let content = format!("{} {}", title, snippet);

        let round = self
            .funding_round
            .captures(&content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let amount = self.funding_amount.captures(&content).map(|c| {
            let value = c.get(1).map(|m| m.as_str()).unwrap_or_default();
            let unit = c
                .get(2)
                .map(|m| m.as_str().chars().next().unwrap_or('M'))
                .unwrap_or('M')
                .to_ascii_uppercase();
            format!("${}{}", value, unit)
        });

        (round, amount)
    }

    /// Company valuation, e.g. "valued at $2.1 billion" → "$2.1B"
    pub fn extract_valuation(&self, title: &str, snippet: &str) -> Option<String> {
        let content = format!("{} {}", title, snippet);
        self.valuation.captures(&content).map(|c| {
            let value = c.get(1).map(|m| m.as_str()).unwrap_or_default();
            let unit = c
                .get(2)
                .map(|m| m.as_str().chars().next().unwrap_or('M'))
                .unwrap_or('M')
                .to_ascii_uppercase();
            format!("${}{}", value, unit)
        })
    }

    /// Founding year with sanity bounds: anything outside
    /// [1990, current year] is treated as noise
    pub fn extract_founded_year(&self, title: &str, snippet: &str) -> Option<u16> {
        let content = format!("{} {}", title, snippet);
        let year: u16 = self
            .founded_year
            .captures(&content)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())?;

        let current_year = Utc::now().year() as u16;
        if (1990..=current_year).contains(&year) {
            Some(year)
        } else {
            None
        }
    }

    /// Headcount bucketed into rounded tiers; counts under 50 are too
    /// noisy to report
    pub fn extract_employee_count(&self, title: &str, snippet: &str) -> Option<String> {
        let content = format!("{} {}", title, snippet);
        let raw = self
            .employee_count
            .captures(&content)
            .and_then(|c| c.get(1))?
            .as_str()
            .replace(',', "");
        let count: u64 = raw.parse().ok()?;

        let bucket = match count {
            10_000.. => "10000+",
            1_000.. => "1000+",
            500.. => "500+",
            100.. => "100+",
            50.. => "50+",
            _ => return None,
        };
        Some(bucket.to_string())
    }

    /// Company website: prefer the result URL's domain unless it belongs
    /// to a known news aggregator, in which case fall back to the first
    /// in-text domain mention
    pub fn extract_website(&self, url: &str, title: &str, snippet: &str) -> Option<String> {
        if let Ok(parsed) = reqwest::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.strip_prefix("www.").unwrap_or(host);
                if !NEWS_AGGREGATOR_DOMAINS
                    .iter()
                    .any(|aggregator| host.ends_with(aggregator))
                {
                    return Some(host.to_string());
                }
            }
        }

        let content = format!("{} {}", title, snippet);
        self.in_text_domain
            .captures_iter(&content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .find(|domain| {
                !NEWS_AGGREGATOR_DOMAINS
                    .iter()
                    .any(|aggregator| domain.ends_with(aggregator))
            })
    }

    /// Why an article matters for the given startup context
    pub fn determine_relevance(&self, title: &str, context: Option<&str>) -> String {
        let context = match context {
            Some(c) if !c.is_empty() => c,
            _ => return "General market insight".to_string(),
        };

        let title_lower = title.to_lowercase();
        if title_lower.contains(&context.to_lowercase()) {
            return format!("Direct match for {}", context);
        }
        if title_lower.contains("funding")
            || title_lower.contains("raises")
            || title_lower.contains("series")
        {
            return "Funding activity in similar space".to_string();
        }
        if title_lower.contains("market")
            || title_lower.contains("growth")
            || title_lower.contains("trend")
        {
            return "Market trend analysis".to_string();
        }
        if title_lower.contains("fails")
            || title_lower.contains("shuts down")
            || title_lower.contains("closes")
        {
            return "Warning signal for industry".to_string();
        }
        "Related industry news".to_string()
    }

    /// Category tag for dashboard grouping
    pub fn categorize_news(&self, title: &str) -> String {
        let title_lower = title.to_lowercase();

        let tag = if title_lower.contains("funding")
            || title_lower.contains("raises")
            || title_lower.contains("investment")
        {
            "Funding"
        } else if title_lower.contains("ai") || title_lower.contains("artificial intelligence") {
            "AI Tech"
        } else if title_lower.contains("startup") || title_lower.contains("company") {
            "Startup News"
        } else if title_lower.contains("market") || title_lower.contains("industry") {
            "Market Analysis"
        } else if title_lower.contains("fail")
            || title_lower.contains("close")
            || title_lower.contains("shut")
        {
            "Risk Alert"
        } else {
            "General"
        };
        tag.to_string()
    }

    /// Turn raw search results into news seeds
    pub fn parse_news(
        &self,
        results: &[ProviderSearchResult],
        context: Option<&str>,
    ) -> Vec<NewsSeed> {
        results
            .iter()
            .map(|result| NewsSeed {
                title: result.title.clone(),
                url: result.url.clone(),
                date: result
                    .date
                    .clone()
                    .unwrap_or_else(|| "Recent".to_string()),
                snippet: result.snippet.clone(),
                relevance: self.determine_relevance(&result.title, context),
                tag: self.categorize_news(&result.title),
            })
            .collect()
    }

    /// Turn raw search results into competitor seeds. Results without an
    /// extractable company name are skipped; repeat sightings of the same
    /// name within the batch are dropped case-insensitively.
    pub fn parse_competitors(&self, results: &[ProviderSearchResult]) -> Vec<CompetitorSeed> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut competitors = Vec::new();

        for result in results {
            let snippet = result.snippet.as_deref().unwrap_or("");

            let name = match self.extract_company_name(&result.title, snippet) {
                Some(name) => name,
                None => continue,
            };
            if !seen.insert(name.to_lowercase()) {
                continue;
            }

            let (last_funding, funding_amount) = self.extract_funding(&result.title, snippet);

            competitors.push(CompetitorSeed {
                name,
                description: (!snippet.is_empty())
                    .then(|| TextUtils::truncate(snippet, 200)),
                website: self.extract_website(&result.url, &result.title, snippet),
                founded_year: self.extract_founded_year(&result.title, snippet),
                employee_count: self.extract_employee_count(&result.title, snippet),
                last_funding,
                funding_amount,
                valuation: self.extract_valuation(&result.title, snippet),
                recent_news: Some(TextUtils::truncate(&result.title, 100)),
                risk_level: self.classify_risk(&result.title, snippet),
            });

            if competitors.len() >= 6 {
                break;
            }
        }

        competitors
    }
}

/// Parse the provider's structured chat-completion output into competitor
/// seeds. The model often wraps the array in markdown fences or prose;
/// this locates the JSON array, validates each element, and drops anything
/// without a usable name.
pub fn parse_structured_competitors(raw: &str) -> Vec<CompetitorSeed> {
    let mut cleaned = raw.trim();
    if let Some(stripped) = cleaned.strip_prefix("```json") {
        cleaned = stripped;
    } else if let Some(stripped) = cleaned.strip_prefix("```") {
        cleaned = stripped;
    }
    cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let start = match cleaned.find('[') {
        Some(i) => i,
        None => {
            tracing::warn!("no JSON array found in structured provider response");
            return Vec::new();
        }
    };
    let end = match cleaned.rfind(']') {
        Some(i) => i + 1,
        None => {
            tracing::warn!("unterminated JSON array in structured provider response");
            return Vec::new();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&cleaned[start..end]) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse structured provider response");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| {
            let name = value.get("name")?.as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(CompetitorSeed {
                name,
                description: string_field(&value, "description"),
                website: string_field(&value, "website"),
                founded_year: value
                    .get("foundedYear")
                    .and_then(|v| v.as_u64())
                    .and_then(|y| u16::try_from(y).ok()),
                employee_count: string_field(&value, "employeeCount"),
                last_funding: string_field(&value, "lastFunding"),
                funding_amount: string_field(&value, "fundingAmount"),
                valuation: string_field(&value, "valuation"),
                recent_news: string_field(&value, "recentNews"),
                risk_level: value
                    .get("riskLevel")
                    .and_then(|v| v.as_str())
                    .map(RiskLevel::from_label)
                    .unwrap_or_default(),
            })
        })
        .take(8)
        .collect()
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| IntelError::Internal {
        message: format!("Invalid extraction regex: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new().unwrap()
    }

    fn result(title: &str, url: &str, snippet: &str) -> ProviderSearchResult {
        ProviderSearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: (!snippet.is_empty()).then(|| snippet.to_string()),
            date: Some("2024-06-01".to_string()),
        }
    }

    #[test]
    fn extracts_name_before_verb() {
        let ex = extractor();
        assert_eq!(
            ex.extract_company_name("Stripe is expanding its payments platform", ""),
            Some("Stripe".to_string())
        );
    }

    #[test]
    fn extracts_name_before_descriptor_and_strips_suffix() {
        let ex = extractor();
        assert_eq!(
            ex.extract_company_name("Acme Corp raises $50 million", ""),
            Some("Acme".to_string())
        );
    }

    #[test]
    fn generic_terms_are_rejected() {
        let ex = extractor();
        assert_eq!(ex.extract_company_name("Company launched a new product", ""), None);
    }

    #[test]
    fn no_match_yields_none() {
        let ex = extractor();
        assert_eq!(ex.extract_company_name("ten trends to watch this year", ""), None);
    }

    #[test]
    fn higher_risk_tier_wins() {
        let ex = extractor();
        assert_eq!(
            ex.classify_risk("Acme becomes a unicorn after series a round", ""),
            RiskLevel::Critical
        );
    }

    #[test]
    fn risk_tiers_fall_through_to_low() {
        let ex = extractor();
        assert_eq!(ex.classify_risk("Acme ships a small update", ""), RiskLevel::Low);
        assert_eq!(
            ex.classify_risk("Acme raises a series a", ""),
            RiskLevel::Medium
        );
        assert_eq!(
            ex.classify_risk("Acme closes series b acquisition", ""),
            RiskLevel::High
        );
    }

    #[test]
    fn funding_round_and_amount_are_independent() {
        let ex = extractor();
        let (round, amount) = ex.extract_funding("Acme raised $50 million in Series B", "");
        assert_eq!(round.as_deref(), Some("Series B"));
        assert_eq!(amount.as_deref(), Some("$50M"));

        let (round, amount) = ex.extract_funding("Acme lands a seed round", "");
        assert_eq!(round.as_deref(), Some("seed"));
        assert_eq!(amount, None);
    }

    #[test]
    fn valuation_is_normalized() {
        let ex = extractor();
        assert_eq!(
            ex.extract_valuation("Acme now valued at $2.1 billion", ""),
            Some("$2.1B".to_string())
        );
    }

    #[test]
    fn founded_year_sanity_bounds() {
        let ex = extractor();
        assert_eq!(ex.extract_founded_year("Acme, founded in 2015", ""), Some(2015));
        assert_eq!(ex.extract_founded_year("Acme, founded in 1850", ""), None);
        assert_eq!(ex.extract_founded_year("Acme, founded in 2999", ""), None);
    }

    #[test]
    fn employee_counts_are_bucketed() {
        let ex = extractor();
        assert_eq!(
            ex.extract_employee_count("Acme now has 1,200 employees", ""),
            Some("1000+".to_string())
        );
        assert_eq!(
            ex.extract_employee_count("Acme has 75 employees", ""),
            Some("50+".to_string())
        );
        assert_eq!(ex.extract_employee_count("Acme has 5 employees", ""), None);
    }

    #[test]
    fn aggregator_urls_fall_back_to_in_text_domains() {
        let ex = extractor();
        assert_eq!(
            ex.extract_website(
                "https://techcrunch.com/2024/06/acme",
                "Acme expands",
                "See acme.io for details"
            ),
            Some("acme.io".to_string())
        );
        assert_eq!(
            ex.extract_website("https://www.acme.com/about", "Acme", ""),
            Some("acme.com".to_string())
        );
    }

    #[test]
    fn batch_deduplicates_company_names() {
        let ex = extractor();
        let results = vec![
            result("Acme raised $5 million", "https://acme.com", "Acme is a fintech"),
            result("ACME is hiring", "https://acme.com/jobs", "Acme is growing"),
        ];
        let seeds = ex.parse_competitors(&results);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].name, "Acme");
    }

    #[test]
    fn results_without_names_are_skipped() {
        let ex = extractor();
        let results = vec![result("ten trends to watch this year", "invalid-url", "")];
        assert!(ex.parse_competitors(&results).is_empty());
    }

    #[test]
    fn news_seeds_carry_relevance_and_tag() {
        let ex = extractor();
        let seeds = ex.parse_news(
            &[result(
                "Fintech startup raises $10M in funding",
                "https://example.com/a",
                "",
            )],
            Some("payments"),
        );
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].tag, "Funding");
        assert_eq!(seeds[0].relevance, "Funding activity in similar space");
    }

    #[test]
    fn structured_json_with_fences_parses() {
        let raw = r#"```json
[{"name": "Acme", "riskLevel": "HIGH", "foundedYear": 2020, "fundingAmount": "$50M"}]
```"#;
        let seeds = parse_structured_competitors(raw);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].name, "Acme");
        assert_eq!(seeds[0].risk_level, RiskLevel::High);
        assert_eq!(seeds[0].founded_year, Some(2020));
        assert_eq!(seeds[0].funding_amount.as_deref(), Some("$50M"));
    }

    #[test]
    fn structured_json_drops_invalid_entries() {
        let raw = r#"Here are the companies: [{"name": "Acme"}, {"name": ""}, {"description": "no name"}]"#;
        let seeds = parse_structured_competitors(raw);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn structured_json_garbage_yields_empty() {
        assert!(parse_structured_competitors("no array here").is_empty());
        assert!(parse_structured_competitors("[{broken").is_empty());
    }
}
