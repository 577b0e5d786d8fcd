//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the intelligence service, loaded from a
//! TOML file with environment-variable overrides and validation.
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Command line arguments (highest priority)
//! 2. Environment variables (`STARTUP_INTEL_*`)
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::errors::{IntelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// External search provider settings
    pub provider: ProviderConfig,
    /// Cache store settings
    pub cache: CacheConfig,
    /// Refresh scheduling policy
    pub scheduler: SchedulerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Bearer token guarding the internal cleanup endpoint
    pub internal_token: String,
}

/// External search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL
    pub api_url: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Chat model used for structured parameter updates
    pub chat_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Default maximum results per search call
    pub max_results: usize,
    /// Country bias for search results
    pub country: String,
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Database file path
    pub db_path: PathBuf,
    /// TTL for cached news, in hours
    pub news_ttl_hours: i64,
    /// TTL for cached competitor discovery results, in hours
    pub competitor_ttl_hours: i64,
    /// TTL for the cheap parameter-update refresh path, in hours
    pub parameter_update_ttl_hours: i64,
}

/// Refresh scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between expensive comprehensive discovery runs, in hours
    pub full_discovery_interval_hours: i64,
    /// Interval between cheap parameter-update runs, in hours
    pub parameter_update_interval_hours: i64,
    /// Topics (industries) reported by the schedule endpoint
    pub topics: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| IntelError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| IntelError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("STARTUP_INTEL_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STARTUP_INTEL_PORT") {
            self.server.port = port.parse().map_err(|_| IntelError::Config {
                message: "Invalid port number in STARTUP_INTEL_PORT".to_string(),
            })?;
        }
        if let Ok(token) = std::env::var("STARTUP_INTEL_INTERNAL_TOKEN") {
            self.server.internal_token = token;
        }
        if let Ok(api_key) = std::env::var("STARTUP_INTEL_PROVIDER_API_KEY") {
            self.provider.api_key = Some(api_key);
        }
        if let Ok(db_path) = std::env::var("STARTUP_INTEL_DB_PATH") {
            self.cache.db_path = PathBuf::from(db_path);
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(IntelError::ValidationFailed {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        for (field, value) in [
            ("cache.news_ttl_hours", self.cache.news_ttl_hours),
            ("cache.competitor_ttl_hours", self.cache.competitor_ttl_hours),
            (
                "cache.parameter_update_ttl_hours",
                self.cache.parameter_update_ttl_hours,
            ),
            (
                "scheduler.full_discovery_interval_hours",
                self.scheduler.full_discovery_interval_hours,
            ),
            (
                "scheduler.parameter_update_interval_hours",
                self.scheduler.parameter_update_interval_hours,
            ),
        ] {
            if value <= 0 {
                return Err(IntelError::ValidationFailed {
                    field: field.to_string(),
                    reason: "Interval must be positive".to_string(),
                });
            }
        }

        if self.scheduler.parameter_update_interval_hours
            >= self.scheduler.full_discovery_interval_hours
        {
            return Err(IntelError::ValidationFailed {
                field: "scheduler.parameter_update_interval_hours".to_string(),
                reason: "Parameter-update interval must be shorter than the discovery interval"
                    .to_string(),
            });
        }

        if self.provider.max_results == 0 || self.provider.max_results > 20 {
            return Err(IntelError::ValidationFailed {
                field: "provider.max_results".to_string(),
                reason: "max_results must be in 1..=20".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.perplexity.ai".to_string(),
            api_key: None,
            chat_model: "sonar".to_string(),
            timeout_seconds: 30,
            max_results: 10,
            country: "US".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                enable_cors: true,
                internal_token: "cleanup-token".to_string(),
            },
            provider: ProviderConfig::default(),
            cache: CacheConfig {
                db_path: PathBuf::from("./data/intel_cache.db"),
                news_ttl_hours: 6,
                competitor_ttl_hours: 12,
                parameter_update_ttl_hours: 2,
            },
            scheduler: SchedulerConfig {
                full_discovery_interval_hours: 24,
                parameter_update_interval_hours: 2,
                topics: vec![
                    "AI/education".to_string(),
                    "SaaS".to_string(),
                    "Fintech".to_string(),
                    "Healthcare".to_string(),
                    "E-commerce".to_string(),
                ],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_scheduler_intervals() {
        let mut config = Config::default();
        config.scheduler.parameter_update_interval_hours = 48;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_ttl() {
        let mut config = Config::default();
        config.cache.news_ttl_hours = 0;
        assert!(config.validate().is_err());
    }
}
