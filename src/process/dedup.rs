use crate::model::MediaCandidate;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Fingerprint of a candidate's URL and dimensions
///
/// Hex SHA-256 of `"{full_url}_{width}_{height}"`, with unknown dimensions
/// written as 0.
pub fn content_hash(candidate: &MediaCandidate) -> String {
    let content = format!(
        "{}_{}_{}",
        candidate.full_url,
        candidate.width.unwrap_or(0),
        candidate.height.unwrap_or(0)
    );
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stamps every candidate with its hash and keeps the first of each hash
pub fn deduplicate(candidates: Vec<MediaCandidate>) -> Vec<MediaCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let hash = content_hash(&candidate);
            let first = seen.insert(hash.clone());
            candidate.content_hash = Some(hash);
            first.then_some(candidate)
        })
        .collect()
}
