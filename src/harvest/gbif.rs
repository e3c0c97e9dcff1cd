//! GBIF occurrence-media harvester

use crate::config::PipelineConfig;
use crate::harvest::license::{license_url, normalize_license};
use crate::harvest::terms::binomial_terms;
use crate::harvest::{endpoint, CandidateFilter, Harvester};
use crate::http::{CachedHttpClient, Pacer};
use crate::model::{CandidateMetadata, MediaCandidate, ResolvedTaxon, Source, SpeciesTaxonomy};
use crate::HttpResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct OccurrenceResponse {
    #[serde(default)]
    results: Vec<Occurrence>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Occurrence {
    key: Option<u64>,
    scientific_name: Option<String>,
    license: Option<String>,
    rights_holder: Option<String>,
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Media {
    #[serde(rename = "type")]
    media_type: Option<String>,
    format: Option<String>,
    identifier: Option<String>,
    references: Option<String>,
    created: Option<String>,
    creator: Option<String>,
    license: Option<String>,
    rights_holder: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Harvester for GBIF occurrence still images
pub struct GbifHarvester {
    client: Arc<CachedHttpClient>,
    base_url: String,
    filter: CandidateFilter,
    pacer: Pacer,
}

impl GbifHarvester {
    pub fn new(
        client: Arc<CachedHttpClient>,
        base_url: impl Into<String>,
        filter: CandidateFilter,
        pacer: Pacer,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            filter,
            pacer,
        }
    }

    pub fn from_config(config: &PipelineConfig, client: Arc<CachedHttpClient>) -> Self {
        Self::new(
            client,
            config.providers.gbif_base_url.clone(),
            CandidateFilter::from_config(config, Source::Gbif),
            Pacer::new(config.courtesy_delay(Source::Gbif)),
        )
    }

    async fn search(&self, scientific_name: &str) -> HttpResult<Vec<Occurrence>> {
        let url = endpoint(
            &self.base_url,
            "/occurrence/search",
            &[
                ("scientificName", scientific_name),
                ("hasCoordinate", "true"),
                ("mediaType", "StillImage"),
                ("limit", "300"),
            ],
        )?;

        let response: OccurrenceResponse = self.client.get(&url, Source::Gbif.as_str()).await?;
        Ok(response.results)
    }

    fn media_to_candidate(
        &self,
        species: &SpeciesTaxonomy,
        occurrence: &Occurrence,
        media: &Media,
    ) -> Option<MediaCandidate> {
        if media.media_type.as_deref() != Some("StillImage") {
            return None;
        }

        let identifier = media.identifier.as_deref().filter(|u| !u.is_empty())?;

        let raw_license = media
            .license
            .as_deref()
            .or(occurrence.license.as_deref())
            .filter(|l| !l.trim().is_empty())?;
        let license = normalize_license(raw_license);
        if !self.filter.license_ok(&license) || !self.filter.dimensions_ok(media.width, media.height) {
            return None;
        }

        let mut candidate = MediaCandidate::new(Source::Gbif, identifier);
        candidate.thumb_url = Some(identifier.to_string());
        candidate.original_page = media
            .references
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| occurrence.key.map(|k| format!("https://www.gbif.org/occurrence/{}", k)))
            .unwrap_or_default();
        if let Some(author) = media
            .creator
            .as_deref()
            .or(occurrence.rights_holder.as_deref())
            .filter(|a| !a.is_empty())
        {
            candidate.author = author.to_string();
        }
        candidate.license_url = license_url(&license);
        candidate.license = license;
        candidate.width = media.width;
        candidate.height = media.height;
        candidate.species_id = Some(species.species_id.clone());
        candidate.metadata = CandidateMetadata::Gbif {
            occurrence_key: occurrence.key,
            scientific_name: occurrence.scientific_name.clone(),
            media_type: media.media_type.clone(),
            format: media.format.clone(),
            created: media.created.clone(),
            rights_holder: media.rights_holder.clone(),
        };

        Some(candidate)
    }
}

#[async_trait]
impl Harvester for GbifHarvester {
    fn source(&self) -> Source {
        Source::Gbif
    }

    async fn harvest_for_species(
        &self,
        species: &SpeciesTaxonomy,
        _taxon: Option<&ResolvedTaxon>,
    ) -> Vec<MediaCandidate> {
        self.pacer.pause().await;

        let mut accepted: Vec<MediaCandidate> = Vec::new();
        let mut seen = HashSet::new();

        'terms: for term in binomial_terms(&species.canonical_name) {
            if self.filter.is_full(&accepted) {
                break;
            }

            let occurrences = match self.search(&term).await {
                Ok(occurrences) => occurrences,
                Err(e) => {
                    tracing::warn!("Failed to harvest GBIF images for {}: {}", term, e);
                    continue;
                }
            };

            for occurrence in &occurrences {
                for media in &occurrence.media {
                    if self.filter.is_full(&accepted) {
                        break 'terms;
                    }
                    let Some(candidate) = self.media_to_candidate(species, occurrence, media) else {
                        continue;
                    };
                    if seen.insert(candidate.full_url.clone()) {
                        accepted.push(candidate);
                    }
                }
            }
        }

        accepted
    }
}
