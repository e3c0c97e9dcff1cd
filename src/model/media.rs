//! Harvested media candidates and per-species image sets

use serde::{Deserialize, Serialize};
use std::fmt;

/// External provider a candidate was harvested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Observation photos, reached through a resolved taxon id
    Inaturalist,
    /// File search on Wikimedia Commons
    Commons,
    /// Occurrence media on GBIF
    Gbif,
}

impl Source {
    /// Tag used for config keys, rate limiting and serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inaturalist => "inaturalist",
            Self::Commons => "commons",
            Self::Gbif => "gbif",
        }
    }

    /// Parses a source tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "inaturalist" => Some(Self::Inaturalist),
            "commons" => Some(Self::Commons),
            "gbif" => Some(Self::Gbif),
            _ => None,
        }
    }

    /// Courtesy delay between species when `rate_limits` does not set one
    pub fn default_courtesy_delay_ms(&self) -> u64 {
        match self {
            Self::Inaturalist => 2000,
            Self::Commons => 2000,
            Self::Gbif => 3000,
        }
    }

    /// All providers in harvest order
    pub fn all() -> [Self; 3] {
        [Self::Inaturalist, Self::Commons, Self::Gbif]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific details kept alongside a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum CandidateMetadata {
    Inaturalist {
        observation_id: Option<u64>,
        photo_id: Option<u64>,
        faves_count: Option<u32>,
        quality_grade: Option<String>,
    },
    Commons {
        title: String,
        description: String,
    },
    Gbif {
        occurrence_key: Option<u64>,
        scientific_name: Option<String>,
        media_type: Option<String>,
        format: Option<String>,
        created: Option<String>,
        rights_holder: Option<String>,
    },
}

impl CandidateMetadata {
    /// Metadata with every optional field empty
    pub fn empty(source: Source) -> Self {
        match source {
            Source::Inaturalist => Self::Inaturalist {
                observation_id: None,
                photo_id: None,
                faves_count: None,
                quality_grade: None,
            },
            Source::Commons => Self::Commons {
                title: String::new(),
                description: String::new(),
            },
            Source::Gbif => Self::Gbif {
                occurrence_key: None,
                scientific_name: None,
                media_type: None,
                format: None,
                created: None,
                rights_holder: None,
            },
        }
    }

    /// Popularity signal, when the provider reports one
    pub fn faves_count(&self) -> Option<u32> {
        match self {
            Self::Inaturalist { faves_count, .. } => *faves_count,
            _ => None,
        }
    }
}

/// A candidate photograph harvested from one provider
///
/// Created by a harvester, enriched with `score` and `content_hash` by the
/// processor, and never mutated after selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub source: Source,
    pub full_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    pub original_page: String,
    pub author: String,
    pub license: String,
    pub license_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_taxon_id: Option<u64>,
    /// Species the harvester was searching for when it found this candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_id: Option<String>,
    pub metadata: CandidateMetadata,
}

impl MediaCandidate {
    /// Creates a bare candidate; harvesters fill in the remaining fields
    pub fn new(source: Source, full_url: impl Into<String>) -> Self {
        Self {
            source,
            full_url: full_url.into(),
            thumb_url: None,
            original_page: String::new(),
            author: "Unknown".to_string(),
            license: "Unknown".to_string(),
            license_url: String::new(),
            width: None,
            height: None,
            score: None,
            content_hash: None,
            provider_taxon_id: None,
            species_id: None,
            metadata: CandidateMetadata::empty(source),
        }
    }

    /// Smaller of width and height, if both are known
    pub fn min_dimension(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(w.min(h)),
            _ => None,
        }
    }

    /// Pixel area, zero when dimensions are unknown
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }

    /// Score assigned by the processor, zero before scoring
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// The selected image set for one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesImages {
    pub species_id: String,
    pub canonical_name: String,
    pub images: Vec<MediaCandidate>,
    pub hero_index: usize,
}

impl SpeciesImages {
    /// The designated hero image
    pub fn hero(&self) -> Option<&MediaCandidate> {
        self.images.get(self.hero_index)
    }

    /// Number of selected images from one source
    pub fn count_from(&self, source: Source) -> usize {
        self.images.iter().filter(|img| img.source == source).count()
    }
}
