//! Configuration module for the image seeding pipeline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use species_image_seeder::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("image_seeding.toml")).unwrap();
//! println!("Minimum dimension: {}", config.image_requirements.min_dimension);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchingConfig, CacheConfig, HarvestingConfig, HttpConfig, ImageRequirements, PathsConfig,
    PipelineConfig, ProviderConfig, RateLimitConfig, ScoringConfig, TestingConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
