//! Data model shared by the harvesters, the processor and the outputs

mod media;
mod taxonomy;

pub use media::{CandidateMetadata, MediaCandidate, Source, SpeciesImages};
pub use taxonomy::{load_taxonomy, read_taxonomy, ResolvedTaxon, SpeciesTaxonomy};
