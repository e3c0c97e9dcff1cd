use crate::model::{MediaCandidate, SpeciesTaxonomy};
use std::collections::HashMap;

/// Buckets candidates by species, preserving arrival order within a bucket
///
/// A candidate carrying the id of an in-scope species goes straight to that
/// species. Otherwise the candidate's serialized form is searched for each
/// species' canonical or common name, case-insensitively, and the first
/// species that matches wins. Unmatched candidates are dropped.
pub fn group_by_species(
    candidates: Vec<MediaCandidate>,
    taxonomy: &[SpeciesTaxonomy],
) -> HashMap<String, Vec<MediaCandidate>> {
    let mut groups: HashMap<String, Vec<MediaCandidate>> = taxonomy
        .iter()
        .map(|s| (s.species_id.clone(), Vec::new()))
        .collect();

    let mut dropped = 0usize;

    for candidate in candidates {
        match find_species_id(&candidate, taxonomy) {
            Some(id) => groups.entry(id).or_default().push(candidate),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!("{} candidates matched no species and were dropped", dropped);
    }

    groups
}

/// Species a candidate belongs to, if any
pub fn find_species_id(candidate: &MediaCandidate, taxonomy: &[SpeciesTaxonomy]) -> Option<String> {
    if let Some(id) = candidate.species_id.as_deref() {
        if taxonomy.iter().any(|s| s.species_id == id) {
            return Some(id.to_string());
        }
    }

    let text = serde_json::to_string(candidate).ok()?.to_lowercase();

    taxonomy
        .iter()
        .find(|s| name_matches(&text, &s.canonical_name) || name_matches(&text, &s.common_name))
        .map(|s| s.species_id.clone())
}

fn name_matches(text: &str, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && text.contains(&name.to_lowercase())
}
