use crate::config::types::{
    CacheConfig, HttpConfig, ImageRequirements, PathsConfig, PipelineConfig, ProviderConfig,
    ScoringConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_licenses(&config.allowed_licenses)?;
    validate_image_requirements(&config.image_requirements)?;
    validate_scoring(&config.scoring)?;
    validate_cache(&config.cache)?;
    validate_http(&config.http)?;
    validate_providers(&config.providers)?;
    validate_paths(&config.paths)?;

    if config.batching.segment_size == 0 || config.batching.extend_batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch sizes must be >= 1".to_string(),
        ));
    }

    if let Some(0) = config.testing.max_species_to_process {
        return Err(ConfigError::Validation(
            "max_species_to_process must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the allowed license list
fn validate_licenses(allowed: &[String]) -> Result<(), ConfigError> {
    if allowed.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_licenses cannot be empty".to_string(),
        ));
    }

    if allowed.iter().any(|token| token.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "allowed_licenses cannot contain blank tokens".to_string(),
        ));
    }

    Ok(())
}

/// Validates dimension thresholds and selection caps
fn validate_image_requirements(req: &ImageRequirements) -> Result<(), ConfigError> {
    if req.min_dimension == 0 {
        return Err(ConfigError::Validation(
            "min_dimension must be >= 1".to_string(),
        ));
    }

    if req.desired_per_species == 0 {
        return Err(ConfigError::Validation(
            "desired_per_species must be >= 1".to_string(),
        ));
    }

    for (source, cap) in &req.max_per_source_per_species {
        if *cap == 0 {
            return Err(ConfigError::Validation(format!(
                "max_per_source_per_species.{} must be >= 1",
                source
            )));
        }
    }

    Ok(())
}

/// Validates scoring weights
fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    let weights = scoring
        .source_weights
        .iter()
        .map(|(name, weight)| (name.as_str(), *weight))
        .chain([
            ("dimension_boost", scoring.dimension_boost),
            ("faves_boost", scoring.faves_boost),
        ]);

    for (name, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::Validation(format!(
                "scoring weight '{}' must be a non-negative number, got {}",
                name, weight
            )));
        }
    }

    Ok(())
}

/// Validates cache settings
fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.enable_disk_caching && cache.cache_ttl_hours == 0 {
        return Err(ConfigError::Validation(
            "cache_ttl_hours must be >= 1 when disk caching is enabled".to_string(),
        ));
    }

    if cache.download_images && cache.image_formats.is_empty() {
        return Err(ConfigError::Validation(
            "image_formats cannot be empty when download_images is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates the HTTP client settings
fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if http.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if http.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            http.max_retries
        )));
    }

    if http.retry_max_delay_ms < http.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
            http.retry_max_delay_ms, http.retry_base_delay_ms
        )));
    }

    Ok(())
}

/// Validates provider base URLs
fn validate_providers(providers: &ProviderConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("inaturalist_base_url", &providers.inaturalist_base_url),
        ("commons_api_url", &providers.commons_api_url),
        ("gbif_base_url", &providers.gbif_base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates that no path is empty
fn validate_paths(paths: &PathsConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("taxonomy", &paths.taxonomy),
        ("cache_dir", &paths.cache_dir),
        ("state_dir", &paths.state_dir),
        ("manifest", &paths.manifest),
        ("media_index", &paths.media_index),
        ("qa_report", &paths.qa_report),
        ("qa_summary", &paths.qa_summary),
        ("image_dir", &paths.image_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "paths.{} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}
