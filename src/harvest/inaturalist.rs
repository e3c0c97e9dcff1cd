//! iNaturalist harvester: resolves species to taxon ids, then pulls
//! research-grade observation photos ordered by popularity

use crate::config::PipelineConfig;
use crate::harvest::license::{license_url, normalize_license};
use crate::harvest::{endpoint, CandidateFilter, Harvester};
use crate::http::{write_atomic, CachedHttpClient, Pacer};
use crate::model::{CandidateMetadata, MediaCandidate, ResolvedTaxon, Source, SpeciesTaxonomy};
use crate::HttpResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct TaxaResponse {
    #[serde(default)]
    results: Vec<TaxonRecord>,
}

/// One entry of the taxon autocomplete response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaxonRecord {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub rank: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    results: Vec<Observation>,
}

#[derive(Debug, Default, Deserialize)]
struct Observation {
    id: Option<u64>,
    quality_grade: Option<String>,
    faves_count: Option<u32>,
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Default, Deserialize)]
struct Photo {
    id: Option<u64>,
    url: Option<String>,
    original_dimensions: Option<Dimensions>,
    attribution: Option<String>,
    license_code: Option<String>,
    license_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Dimensions {
    width: Option<u32>,
    height: Option<u32>,
}

/// Result of mapping one species onto an iNaturalist taxon
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(ResolvedTaxon),
    NotFound,
}

/// Resolved taxa for a batch of species plus the per-species misses
#[derive(Debug, Clone, Default)]
pub struct TaxaResolution {
    pub resolved: Vec<ResolvedTaxon>,
    pub errors: Vec<String>,
}

impl TaxaResolution {
    pub fn taxon_for(&self, species_id: &str) -> Option<&ResolvedTaxon> {
        self.resolved.iter().find(|t| t.species_id == species_id)
    }
}

/// Picks the best autocomplete match for `query`
///
/// An exact case-insensitive name match wins. Otherwise the first
/// species-rank record whose name contains the query is used.
pub fn choose_taxon<'a>(query: &str, records: &'a [TaxonRecord]) -> Option<&'a TaxonRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let usable = || {
        records
            .iter()
            .filter(|r| r.id.is_some() && r.name.as_deref().is_some_and(|n| !n.is_empty()))
    };

    usable()
        .find(|r| r.name.as_deref().is_some_and(|n| n.to_lowercase() == query))
        .or_else(|| {
            usable().find(|r| {
                r.rank.as_deref() == Some("species")
                    && r.name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&query))
            })
        })
}

/// Harvester for iNaturalist observation photos
pub struct INaturalistHarvester {
    client: Arc<CachedHttpClient>,
    base_url: String,
    filter: CandidateFilter,
    pacer: Pacer,
}

impl INaturalistHarvester {
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
            config.providers.inaturalist_base_url.clone(),
            CandidateFilter::from_config(config, Source::Inaturalist),
            Pacer::new(config.courtesy_delay(Source::Inaturalist)),
        )
    }

    /// Maps one species onto an iNaturalist taxon id
    ///
    /// # Returns
    ///
    /// * `Ok(ResolveOutcome::Resolved(_))` - A taxon was chosen
    /// * `Ok(ResolveOutcome::NotFound)` - No acceptable match was returned
    /// * `Err(HttpError)` - The lookup failed after retries
    pub async fn map_to_provider_id(&self, species: &SpeciesTaxonomy) -> HttpResult<ResolveOutcome> {
        let url = endpoint(
            &self.base_url,
            "/taxa/autocomplete",
            &[("q", species.canonical_name.as_str()), ("rank_level", "10")],
        )?;

        let response: TaxaResponse = self.client.get(&url, Source::Inaturalist.as_str()).await?;

        let Some(record) = choose_taxon(&species.canonical_name, &response.results) else {
            return Ok(ResolveOutcome::NotFound);
        };

        let (Some(id), Some(name)) = (record.id, record.name.clone()) else {
            return Ok(ResolveOutcome::NotFound);
        };

        Ok(ResolveOutcome::Resolved(ResolvedTaxon {
            species_id: species.species_id.clone(),
            provider_taxon_id: id,
            rank: record.rank.clone().unwrap_or_else(|| "unknown".to_string()),
            exact_match: name.to_lowercase() == species.canonical_name.to_lowercase(),
            matched_name: name,
        }))
    }

    /// Resolves every species in `species`, never failing the batch
    pub async fn resolve_taxa(&self, species: &[SpeciesTaxonomy]) -> TaxaResolution {
        tracing::info!("Mapping {} species to iNaturalist taxa", species.len());

        let mut resolution = TaxaResolution::default();

        for (i, row) in species.iter().enumerate() {
            self.pacer.pause().await;
            tracing::debug!("  Resolving {}/{}: {}", i + 1, species.len(), row.canonical_name);

            match self.map_to_provider_id(row).await {
                Ok(ResolveOutcome::Resolved(taxon)) => {
                    tracing::debug!(
                        "  {} -> taxon {} ({})",
                        row.canonical_name,
                        taxon.provider_taxon_id,
                        if taxon.exact_match { "exact" } else { "partial" }
                    );
                    resolution.resolved.push(taxon);
                }
                Ok(ResolveOutcome::NotFound) => {
                    tracing::warn!("No taxon found for {}", row.canonical_name);
                    resolution
                        .errors
                        .push(format!("No taxon found for {}", row.canonical_name));
                }
                Err(e) => {
                    tracing::warn!("Error mapping {}: {}", row.canonical_name, e);
                    resolution
                        .errors
                        .push(format!("Error mapping {}: {}", row.canonical_name, e));
                }
            }
        }

        tracing::info!(
            "Mapped {}/{} species to iNaturalist taxa",
            resolution.resolved.len(),
            species.len()
        );
        resolution
    }

    async fn fetch_candidates(
        &self,
        species: &SpeciesTaxonomy,
        taxon: &ResolvedTaxon,
    ) -> HttpResult<Vec<MediaCandidate>> {
        let taxon_id = taxon.provider_taxon_id.to_string();
        let url = endpoint(
            &self.base_url,
            "/observations",
            &[
                ("taxon_id", taxon_id.as_str()),
                ("quality_grade", "research"),
                ("photos", "true"),
                ("order_by", "faves"),
                ("per_page", "200"),
            ],
        )?;

        let response: ObservationsResponse =
            self.client.get(&url, Source::Inaturalist.as_str()).await?;

        let mut accepted = Vec::new();

        'observations: for obs in response.results {
            for photo in &obs.photos {
                if self.filter.is_full(&accepted) {
                    break 'observations;
                }
                if let Some(candidate) = self.photo_to_candidate(species, taxon, &obs, photo) {
                    accepted.push(candidate);
                }
            }
        }

        Ok(accepted)
    }

    fn photo_to_candidate(
        &self,
        species: &SpeciesTaxonomy,
        taxon: &ResolvedTaxon,
        obs: &Observation,
        photo: &Photo,
    ) -> Option<MediaCandidate> {
        let square_url = photo.url.as_deref().filter(|u| !u.is_empty())?;
        let raw_license = photo.license_code.as_deref().filter(|l| !l.trim().is_empty())?;

        let license = normalize_license(raw_license);
        if !self.filter.license_ok(&license) {
            return None;
        }

        let (width, height) = match &photo.original_dimensions {
            Some(d) => (d.width, d.height),
            None => (None, None),
        };
        if !self.filter.dimensions_ok(width, height) {
            return None;
        }

        let mut candidate = MediaCandidate::new(Source::Inaturalist, square_url.replace("/square.", "/medium."));
        candidate.thumb_url = Some(square_url.to_string());
        candidate.original_page = obs
            .id
            .map(|id| format!("https://www.inaturalist.org/observations/{}", id))
            .unwrap_or_default();
        if let Some(attribution) = photo.attribution.as_deref().filter(|a| !a.is_empty()) {
            candidate.author = attribution.to_string();
        }
        candidate.license_url = photo
            .license_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| license_url(&license));
        candidate.license = license;
        candidate.width = width;
        candidate.height = height;
        candidate.provider_taxon_id = Some(taxon.provider_taxon_id);
        candidate.species_id = Some(species.species_id.clone());
        candidate.metadata = CandidateMetadata::Inaturalist {
            observation_id: obs.id,
            photo_id: photo.id,
            faves_count: obs.faves_count,
            quality_grade: obs.quality_grade.clone(),
        };

        Some(candidate)
    }
}

#[async_trait]
impl Harvester for INaturalistHarvester {
    fn source(&self) -> Source {
        Source::Inaturalist
    }

    async fn harvest_for_species(
        &self,
        species: &SpeciesTaxonomy,
        taxon: Option<&ResolvedTaxon>,
    ) -> Vec<MediaCandidate> {
        let Some(taxon) = taxon else {
            tracing::debug!("No iNaturalist taxon for {}, skipping", species.canonical_name);
            return Vec::new();
        };

        self.pacer.pause().await;

        match self.fetch_candidates(species, taxon).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    "Failed to harvest iNaturalist images for taxon {}: {}",
                    taxon.provider_taxon_id,
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Reads the resolved-taxa side cache, empty when missing or unreadable
pub async fn load_taxa_cache(path: &Path) -> Vec<ResolvedTaxon> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable taxa cache {}: {}", path.display(), e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

/// Merges `taxa` into the side cache at `path`, replacing by species id
pub async fn save_taxa_cache(path: &Path, taxa: &[ResolvedTaxon]) -> std::io::Result<()> {
    let mut merged: BTreeMap<String, ResolvedTaxon> = load_taxa_cache(path)
        .await
        .into_iter()
        .map(|t| (t.species_id.clone(), t))
        .collect();

    for taxon in taxa {
        merged.insert(taxon.species_id.clone(), taxon.clone());
    }

    let all: Vec<&ResolvedTaxon> = merged.values().collect();
    let json = serde_json::to_vec_pretty(&all)?;
    write_atomic(path, &json).await
}
