//! Manifest and media-index persistence
//!
//! The manifest is a JSON array of `SpeciesImages` sorted by species id and
//! always written via temp file + rename. The media index is an append-only
//! JSON Lines audit trail of every harvested candidate.

use crate::http::write_atomic;
use crate::model::{MediaCandidate, SpeciesImages};
use crate::SeedError;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Outcome counts of a manifest merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub replaced: usize,
    pub retained: usize,
}

/// Loads the manifest at `path`
///
/// A missing, empty or undecodable file is an empty manifest; the last case
/// is logged and the file is replaced on the next write.
pub async fn load_manifest(path: &Path) -> Result<Vec<SpeciesImages>, SeedError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(&raw) {
        Ok(manifest) => Ok(manifest),
        Err(e) => {
            tracing::warn!(
                "Manifest {} is unreadable ({}); starting from an empty manifest",
                path.display(),
                e
            );
            Ok(Vec::new())
        }
    }
}

/// Merges fresh entries into an existing manifest
///
/// An entry for a species replaces the existing one wholesale. Species in
/// `scope` that produced no fresh entry keep whatever they had. The result
/// is sorted by species id.
pub fn merge_manifest(
    existing: Vec<SpeciesImages>,
    fresh: Vec<SpeciesImages>,
    scope: &[String],
) -> (Vec<SpeciesImages>, MergeStats) {
    let mut merged: BTreeMap<String, SpeciesImages> = existing
        .into_iter()
        .map(|entry| (entry.species_id.clone(), entry))
        .collect();

    let mut stats = MergeStats::default();

    for species_id in scope {
        if merged.contains_key(species_id) && !fresh.iter().any(|e| &e.species_id == species_id) {
            tracing::info!("No new images for {}, keeping existing manifest entry", species_id);
            stats.retained += 1;
        }
    }

    for entry in fresh {
        match merged.insert(entry.species_id.clone(), entry) {
            Some(_) => stats.replaced += 1,
            None => stats.added += 1,
        }
    }

    (merged.into_values().collect(), stats)
}

/// Writes the manifest atomically, sorted by species id
pub async fn write_manifest(path: &Path, manifest: &[SpeciesImages]) -> Result<(), SeedError> {
    let mut sorted: Vec<&SpeciesImages> = manifest.iter().collect();
    sorted.sort_by(|a, b| a.species_id.cmp(&b.species_id));

    let json = serde_json::to_vec_pretty(&sorted)?;
    write_atomic(path, &json).await?;

    tracing::info!(
        "Wrote manifest with {} species to {}",
        sorted.len(),
        path.display()
    );
    Ok(())
}

/// Appends candidates to the JSON Lines media index
pub async fn append_media_index(path: &Path, candidates: &[MediaCandidate]) -> Result<(), SeedError> {
    if candidates.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut buf = Vec::new();
    for candidate in candidates {
        serde_json::to_writer(&mut buf, candidate)?;
        buf.push(b'\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&buf).await?;
    file.flush().await?;

    tracing::debug!("Appended {} candidates to {}", candidates.len(), path.display());
    Ok(())
}
