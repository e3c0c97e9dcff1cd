//! Species image seeder: an offline batch pipeline that harvests candidate
//! photographs for a fixed species list
//!
//! This crate queries several biodiversity APIs, filters the returned photos
//! by license and size, deduplicates and scores them, and writes a compact
//! per-species manifest together with a QA report. Long runs can be resumed
//! from per-mode progress checkpoints.

pub mod config;
pub mod harvest;
pub mod http;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod process;

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    #[error("No taxa were resolved for {scope}; cannot proceed with harvesting")]
    NoTaxaResolved { scope: String },

    #[error("Invalid stage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: pipeline::RunStage,
        to: pipeline::RunStage,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the cached HTTP client once retries are exhausted
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("IO error while downloading {url}: {source}")]
    Io { url: String, source: std::io::Error },

    #[error("Invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

impl HttpError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } => true,
            Self::Client(_) | Self::Io { .. } | Self::InvalidUrl { .. } => false,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SeedError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for HTTP client operations
pub type HttpResult<T> = std::result::Result<T, HttpError>;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use model::{MediaCandidate, ResolvedTaxon, Source, SpeciesImages, SpeciesTaxonomy};
pub use pipeline::{Orchestrator, RunMode, RunStage};
