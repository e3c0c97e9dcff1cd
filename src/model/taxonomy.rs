//! Species reference records and resolved provider taxa

use crate::SeedError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// One row of the taxonomy input, keyed by `species_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesTaxonomy {
    pub species_id: String,
    pub canonical_name: String,
    pub common_name: String,
    pub family: String,
    pub genus: String,
}

/// Mapping of a species onto the taxon-resolving provider's identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTaxon {
    pub species_id: String,
    pub provider_taxon_id: u64,
    pub rank: String,
    pub matched_name: String,
    pub exact_match: bool,
}

/// Loads the taxonomy CSV from disk
///
/// Any malformed row, duplicate `species_id`, or blank identifier aborts the
/// load; the pipeline must not start harvesting on a broken species list.
pub fn load_taxonomy(path: &Path) -> Result<Vec<SpeciesTaxonomy>, SeedError> {
    let file = std::fs::File::open(path).map_err(|e| {
        SeedError::Taxonomy(format!("cannot open {}: {}", path.display(), e))
    })?;
    read_taxonomy(file)
}

/// Parses taxonomy rows from any reader
pub fn read_taxonomy<R: Read>(reader: R) -> Result<Vec<SpeciesTaxonomy>, SeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut species = Vec::new();
    let mut seen = HashSet::new();

    for row in csv_reader.deserialize() {
        let row: SpeciesTaxonomy = row?;

        if row.species_id.is_empty() {
            return Err(SeedError::Taxonomy("row with empty species_id".to_string()));
        }
        if row.canonical_name.is_empty() {
            return Err(SeedError::Taxonomy(format!(
                "species '{}' has an empty canonical_name",
                row.species_id
            )));
        }
        if !seen.insert(row.species_id.clone()) {
            return Err(SeedError::Taxonomy(format!(
                "duplicate species_id '{}'",
                row.species_id
            )));
        }

        species.push(row);
    }

    Ok(species)
}
