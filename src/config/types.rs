use crate::model::Source;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the image seeding pipeline
///
/// Loaded once per run and treated as immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// License tokens accepted by the harvesters (case-insensitive substring match)
    pub allowed_licenses: Vec<String>,

    /// License tokens rejected by the harvesters even when an allowed token
    /// also matches; counted as disallowed in the QA report
    #[serde(default = "default_disallowed_licenses")]
    pub disallowed_licenses: Vec<String>,

    /// Maximum in-flight requests per source tag
    #[serde(default)]
    pub concurrency: HashMap<String, usize>,

    /// Pacing settings per source tag
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,

    pub image_requirements: ImageRequirements,

    pub scoring: ScoringConfig,

    pub cache: CacheConfig,

    #[serde(default)]
    pub testing: TestingConfig,

    #[serde(default)]
    pub harvesting: HarvestingConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub providers: ProviderConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub batching: BatchingConfig,
}

/// Per-source pacing
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Upper bound on live requests per minute issued by the HTTP client
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Courtesy pause a harvester takes between successive species (milliseconds)
    #[serde(default)]
    pub delay_between_requests: u64,
}

/// Image acceptance thresholds and selection caps
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRequirements {
    /// Smallest acceptable value of min(width, height) in pixels
    pub min_dimension: u32,

    /// Maximum number of images kept per species
    pub desired_per_species: usize,

    /// Maximum number of images per source per species
    #[serde(default)]
    pub max_per_source_per_species: HashMap<String, usize>,
}

/// Weights used by the candidate scorer
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub source_weights: HashMap<String, f64>,

    pub dimension_boost: f64,

    pub faves_boost: f64,
}

/// Disk cache behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enable_disk_caching: bool,

    pub cache_ttl_hours: u64,

    /// Save selected images under `paths.image_dir`
    #[serde(default)]
    pub download_images: bool,

    /// File extensions accepted for downloads
    #[serde(default = "default_image_formats")]
    pub image_formats: Vec<String>,
}

/// Options for small trial runs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestingConfig {
    #[serde(default)]
    pub enable_testing_mode: bool,

    #[serde(default)]
    pub max_species_to_process: Option<usize>,
}

/// Provider toggles
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestingConfig {
    #[serde(default = "default_true")]
    pub enable_inaturalist: bool,

    #[serde(default = "default_true")]
    pub enable_commons: bool,

    #[serde(default = "default_true")]
    pub enable_gbif: bool,
}

/// HTTP client identity, timeout and retry budget
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Provider API base URLs
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_inaturalist_url")]
    pub inaturalist_base_url: String,

    #[serde(default = "default_commons_url")]
    pub commons_api_url: String,

    #[serde(default = "default_gbif_url")]
    pub gbif_base_url: String,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_taxonomy_path")]
    pub taxonomy: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_manifest_path")]
    pub manifest: PathBuf,

    #[serde(default = "default_media_index_path")]
    pub media_index: PathBuf,

    #[serde(default = "default_qa_report_path")]
    pub qa_report: PathBuf,

    #[serde(default = "default_qa_summary_path")]
    pub qa_summary: PathBuf,

    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

/// Unit sizes for the segmented and extend run modes
#[derive(Debug, Clone, Deserialize)]
pub struct BatchingConfig {
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,

    #[serde(default = "default_extend_batch_size")]
    pub extend_batch_size: usize,
}

const DEFAULT_SOURCE_WEIGHT: f64 = 0.5;
const DEFAULT_PER_SOURCE_CAP: usize = 3;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

impl PipelineConfig {
    /// Scoring weight for a source, 0.5 when unconfigured
    pub fn source_weight(&self, source: Source) -> f64 {
        self.scoring
            .source_weights
            .get(source.as_str())
            .copied()
            .unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    /// Per-species cap for a source, 3 when unconfigured
    pub fn max_per_source(&self, source: Source) -> usize {
        self.image_requirements
            .max_per_source_per_species
            .get(source.as_str())
            .copied()
            .unwrap_or(DEFAULT_PER_SOURCE_CAP)
    }

    /// Minimum spacing between live requests for a source tag
    pub fn min_request_interval(&self, source: &str) -> Duration {
        match self
            .rate_limits
            .get(source)
            .and_then(|limits| limits.requests_per_minute)
        {
            Some(rpm) if rpm > 0 => Duration::from_millis(60_000 / u64::from(rpm)),
            _ => DEFAULT_MIN_INTERVAL,
        }
    }

    /// Courtesy delay a harvester waits between successive species
    pub fn courtesy_delay(&self, source: Source) -> Duration {
        let ms = self
            .rate_limits
            .get(source.as_str())
            .map(|limits| limits.delay_between_requests)
            .unwrap_or_else(|| source.default_courtesy_delay_ms());
        Duration::from_millis(ms)
    }

    /// Maximum in-flight requests for a source tag
    pub fn concurrency_for(&self, source: &str) -> usize {
        self.concurrency.get(source).copied().unwrap_or(1).max(1)
    }

    /// Whether a given harvester is switched on
    pub fn is_source_enabled(&self, source: Source) -> bool {
        match source {
            Source::Inaturalist => self.harvesting.enable_inaturalist,
            Source::Commons => self.harvesting.enable_commons,
            Source::Gbif => self.harvesting.enable_gbif,
        }
    }

    /// Species limit applied in testing mode
    pub fn species_limit(&self) -> Option<usize> {
        if self.testing.enable_testing_mode {
            self.testing.max_species_to_process
        } else {
            None
        }
    }
}

impl Default for HarvestingConfig {
    fn default() -> Self {
        Self {
            enable_inaturalist: true,
            enable_commons: true,
            enable_gbif: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            inaturalist_base_url: default_inaturalist_url(),
            commons_api_url: default_commons_url(),
            gbif_base_url: default_gbif_url(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            taxonomy: default_taxonomy_path(),
            cache_dir: default_cache_dir(),
            state_dir: default_state_dir(),
            manifest: default_manifest_path(),
            media_index: default_media_index_path(),
            qa_report: default_qa_report_path(),
            qa_summary: default_qa_summary_path(),
            image_dir: default_image_dir(),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            segment_size: default_segment_size(),
            extend_batch_size: default_extend_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_disallowed_licenses() -> Vec<String> {
    vec![
        "CC BY-NC".to_string(),
        "CC BY-ND".to_string(),
        "All Rights Reserved".to_string(),
    ]
}

fn default_image_formats() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_user_agent() -> String {
    format!("SpeciesImageSeeder/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_inaturalist_url() -> String {
    "https://api.inaturalist.org/v1".to_string()
}

fn default_commons_url() -> String {
    "https://commons.wikimedia.org/w/api.php".to_string()
}

fn default_gbif_url() -> String {
    "https://api.gbif.org/v1".to_string()
}

fn default_taxonomy_path() -> PathBuf {
    PathBuf::from("taxonomy/species_taxonomy.csv")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("harvest/cache")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("out/species_images.json")
}

fn default_media_index_path() -> PathBuf {
    PathBuf::from("stage/media_index.jsonl")
}

fn default_qa_report_path() -> PathBuf {
    PathBuf::from("reports/image_seed_qc.json")
}

fn default_qa_summary_path() -> PathBuf {
    PathBuf::from("reports/image_seed_qc.md")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images/species")
}

fn default_segment_size() -> usize {
    3
}

fn default_extend_batch_size() -> usize {
    5
}
