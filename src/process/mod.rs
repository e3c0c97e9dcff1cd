//! Candidate processing: grouping, deduplication, scoring and selection
//!
//! Turns the raw harvest of a run into at most one `SpeciesImages` per
//! species. Species left with no usable candidates produce no entry at all.

mod dedup;
mod grouping;
mod scoring;

pub use dedup::{content_hash, deduplicate};
pub use grouping::{find_species_id, group_by_species};
pub use scoring::{hero_index, score_candidates, select_top, SelectionRules};

use crate::config::PipelineConfig;
use crate::model::{MediaCandidate, SpeciesImages, SpeciesTaxonomy};

/// Applies the selection pipeline to harvested candidates
#[derive(Debug, Clone)]
pub struct CandidateProcessor {
    rules: SelectionRules,
}

impl CandidateProcessor {
    pub fn new(rules: SelectionRules) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(SelectionRules::from_config(config))
    }

    pub fn rules(&self) -> &SelectionRules {
        &self.rules
    }

    /// Processes a run's candidates against the species in scope
    ///
    /// Output follows the order of `taxonomy`.
    pub fn process(
        &self,
        candidates: Vec<MediaCandidate>,
        taxonomy: &[SpeciesTaxonomy],
    ) -> Vec<SpeciesImages> {
        let mut groups = group_by_species(candidates, taxonomy);

        let results: Vec<SpeciesImages> = taxonomy
            .iter()
            .filter_map(|species| {
                let group = groups.remove(&species.species_id).unwrap_or_default();
                self.process_species(species, group)
            })
            .collect();

        tracing::info!(
            "Processed images for {}/{} species",
            results.len(),
            taxonomy.len()
        );
        results
    }

    /// Dedup, score, select and pick a hero for one species
    pub fn process_species(
        &self,
        species: &SpeciesTaxonomy,
        candidates: Vec<MediaCandidate>,
    ) -> Option<SpeciesImages> {
        if candidates.is_empty() {
            return None;
        }

        let deduped = deduplicate(candidates);
        let scored = score_candidates(&self.rules, deduped);
        let selected = select_top(&self.rules, scored);

        if selected.is_empty() {
            return None;
        }

        Some(SpeciesImages {
            species_id: species.species_id.clone(),
            canonical_name: species.canonical_name.clone(),
            hero_index: hero_index(&selected),
            images: selected,
        })
    }
}
