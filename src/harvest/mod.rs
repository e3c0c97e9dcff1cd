//! Source harvesters
//!
//! Each provider gets one harvester. A harvester turns a species (and, for
//! iNaturalist, its resolved taxon) into license- and size-filtered media
//! candidates. Provider errors never escape a harvester: they are logged and
//! count as zero results for the query that failed.

mod commons;
mod gbif;
mod inaturalist;
mod license;
mod terms;

pub use commons::CommonsHarvester;
pub use gbif::GbifHarvester;
pub use inaturalist::{
    choose_taxon, load_taxa_cache, save_taxa_cache, INaturalistHarvester, ResolveOutcome,
    TaxaResolution, TaxonRecord,
};
pub use license::{is_license_allowed, license_url, normalize_license, LicenseClass};
pub use terms::{binomial_terms, search_terms};

use crate::config::PipelineConfig;
use crate::http::CachedHttpClient;
use crate::model::{MediaCandidate, ResolvedTaxon, Source, SpeciesTaxonomy};
use crate::{HttpError, HttpResult};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Common contract of every provider harvester
#[async_trait]
pub trait Harvester: Send + Sync {
    /// Provider this harvester pulls from
    fn source(&self) -> Source;

    /// Harvests accepted candidates for one species
    ///
    /// `taxon` is the resolved provider taxon, when one exists. Harvesters
    /// that search by name ignore it.
    async fn harvest_for_species(
        &self,
        species: &SpeciesTaxonomy,
        taxon: Option<&ResolvedTaxon>,
    ) -> Vec<MediaCandidate>;
}

/// License and size gates plus the per-source cap
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    allowed_licenses: Vec<String>,
    disallowed_licenses: Vec<String>,
    min_dimension: u32,
    cap: usize,
}

impl CandidateFilter {
    pub fn new(
        allowed_licenses: Vec<String>,
        disallowed_licenses: Vec<String>,
        min_dimension: u32,
        cap: usize,
    ) -> Self {
        Self {
            allowed_licenses,
            disallowed_licenses,
            min_dimension,
            cap,
        }
    }

    pub fn from_config(config: &PipelineConfig, source: Source) -> Self {
        Self::new(
            config.allowed_licenses.clone(),
            config.disallowed_licenses.clone(),
            config.image_requirements.min_dimension,
            config.max_per_source(source),
        )
    }

    /// Maximum accepted candidates per species
    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_full(&self, accepted: &[MediaCandidate]) -> bool {
        accepted.len() >= self.cap
    }

    /// Matches an allowed token and no disallowed one
    ///
    /// Normalized tokens like `CC BY-NC` contain `CC BY`, so the disallowed
    /// list is what keeps restricted variants out.
    pub fn license_ok(&self, license: &str) -> bool {
        is_license_allowed(license, &self.allowed_licenses)
            && !is_license_allowed(license, &self.disallowed_licenses)
    }

    /// Unknown dimensions pass; known ones must meet the floor
    pub fn dimensions_ok(&self, width: Option<u32>, height: Option<u32>) -> bool {
        match (width, height) {
            (Some(w), Some(h)) => w.min(h) >= self.min_dimension,
            _ => true,
        }
    }

    /// Both gates at once
    pub fn accepts(&self, candidate: &MediaCandidate) -> bool {
        self.license_ok(&candidate.license) && self.dimensions_ok(candidate.width, candidate.height)
    }
}

/// The enabled harvesters, run side by side for each species
pub struct HarvesterSet {
    pub inaturalist: Option<INaturalistHarvester>,
    pub commons: Option<CommonsHarvester>,
    pub gbif: Option<GbifHarvester>,
}

impl HarvesterSet {
    /// Builds the harvesters switched on in `[harvesting]`
    pub fn from_config(config: &PipelineConfig, client: Arc<CachedHttpClient>) -> Self {
        let inaturalist = config
            .is_source_enabled(Source::Inaturalist)
            .then(|| INaturalistHarvester::from_config(config, Arc::clone(&client)));
        let commons = config
            .is_source_enabled(Source::Commons)
            .then(|| CommonsHarvester::from_config(config, Arc::clone(&client)));
        let gbif = config
            .is_source_enabled(Source::Gbif)
            .then(|| GbifHarvester::from_config(config, Arc::clone(&client)));

        Self {
            inaturalist,
            commons,
            gbif,
        }
    }

    /// Sources with an active harvester
    pub fn enabled_sources(&self) -> Vec<Source> {
        let mut sources = Vec::new();
        if self.inaturalist.is_some() {
            sources.push(Source::Inaturalist);
        }
        if self.commons.is_some() {
            sources.push(Source::Commons);
        }
        if self.gbif.is_some() {
            sources.push(Source::Gbif);
        }
        sources
    }

    /// Harvests one species from every enabled provider concurrently
    ///
    /// Results are concatenated in provider order so downstream
    /// deduplication sees a stable arrival order.
    pub async fn harvest_species(
        &self,
        species: &SpeciesTaxonomy,
        taxon: Option<&ResolvedTaxon>,
    ) -> Vec<MediaCandidate> {
        let (mut inat, commons, gbif) = tokio::join!(
            run_optional(self.inaturalist.as_ref(), species, taxon),
            run_optional(self.commons.as_ref(), species, taxon),
            run_optional(self.gbif.as_ref(), species, taxon),
        );

        inat.extend(commons);
        inat.extend(gbif);
        inat
    }
}

async fn run_optional<H: Harvester>(
    harvester: Option<&H>,
    species: &SpeciesTaxonomy,
    taxon: Option<&ResolvedTaxon>,
) -> Vec<MediaCandidate> {
    match harvester {
        Some(h) => {
            let candidates = h.harvest_for_species(species, taxon).await;
            tracing::info!(
                "  {} [{}]: {} images",
                species.canonical_name,
                h.source(),
                candidates.len()
            );
            candidates
        }
        None => Vec::new(),
    }
}

/// Joins `path` onto a provider base URL and appends encoded query pairs
pub(crate) fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> HttpResult<String> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&joined, params)
        .map(String::from)
        .map_err(|source| HttpError::InvalidUrl {
            url: joined,
            source,
        })
}
