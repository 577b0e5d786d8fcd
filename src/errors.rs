//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the intelligence service, covering the
//! cache store, the external search provider, extraction, and the API layer.
//!
//! ## Key Features
//! - Hierarchical error types with detailed context
//! - Automatic error conversion and chaining
//! - Error categories for structured logging

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, IntelError>;

/// Error types for the intelligence service
#[derive(Debug, Error)]
pub enum IntelError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// External search provider failures (network, 4xx/5xx)
    #[error("Provider error: {details}")]
    Provider { details: String },

    /// Provider responded but the payload could not be validated
    #[error("Failed to parse provider response from {source_kind}: {details}")]
    ProviderParsing {
        source_kind: String,
        details: String,
    },

    /// Cache read failures; callers degrade these to a miss
    #[error("Cache read failed: {details}")]
    CacheRead { details: String },

    /// Cache write failures; callers log and serve fresh data anyway
    #[error("Cache write failed: {details}")]
    CacheWrite { details: String },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IntelError {
    /// Check if the error is recoverable (can be retried by the caller)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IntelError::Provider { .. }
                | IntelError::CacheRead { .. }
                | IntelError::CacheWrite { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            IntelError::Config { .. } => "configuration",
            IntelError::Provider { .. } | IntelError::ProviderParsing { .. } => "provider",
            IntelError::CacheRead { .. } | IntelError::CacheWrite { .. } => "cache",
            IntelError::Database(_) | IntelError::SerializationFailed { .. } => "storage",
            IntelError::ValidationFailed { .. } => "validation",
            IntelError::Toml(_) | IntelError::Internal { .. } => "generic",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for IntelError {
    fn from(err: std::io::Error) -> Self {
        IntelError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for IntelError {
    fn from(err: serde_json::Error) -> Self {
        IntelError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<reqwest::Error> for IntelError {
    fn from(err: reqwest::Error) -> Self {
        IntelError::Provider {
            details: err.to_string(),
        }
    }
}

impl From<bincode::Error> for IntelError {
    fn from(err: bincode::Error) -> Self {
        IntelError::SerializationFailed {
            message: format!("Binary serialization error: {}", err),
        }
    }
}
