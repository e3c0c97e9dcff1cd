use crate::config::PipelineConfig;
use crate::model::{MediaCandidate, Source};
use std::cmp::Ordering;
use std::collections::HashMap;

const DEFAULT_SOURCE_WEIGHT: f64 = 0.5;
const DEFAULT_PER_SOURCE_CAP: usize = 3;

/// Reference size at which the dimension term saturates
const DIMENSION_SATURATION: f64 = 1000.0;

/// Favourite count at which the popularity term saturates
const FAVES_SATURATION: f64 = 10.0;

/// Weights and caps that drive scoring and selection
#[derive(Debug, Clone)]
pub struct SelectionRules {
    pub source_weights: HashMap<Source, f64>,
    pub dimension_boost: f64,
    pub faves_boost: f64,
    pub per_source_caps: HashMap<Source, usize>,
    pub desired_per_species: usize,
}

impl SelectionRules {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            source_weights: Source::all()
                .into_iter()
                .map(|s| (s, config.source_weight(s)))
                .collect(),
            dimension_boost: config.scoring.dimension_boost,
            faves_boost: config.scoring.faves_boost,
            per_source_caps: Source::all()
                .into_iter()
                .map(|s| (s, config.max_per_source(s)))
                .collect(),
            desired_per_species: config.image_requirements.desired_per_species,
        }
    }

    pub fn weight(&self, source: Source) -> f64 {
        self.source_weights
            .get(&source)
            .copied()
            .unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    pub fn cap(&self, source: Source) -> usize {
        self.per_source_caps
            .get(&source)
            .copied()
            .unwrap_or(DEFAULT_PER_SOURCE_CAP)
    }

    /// Score for one candidate
    ///
    /// `weight + dimension_boost * min(1, min(w, h) / 1000)
    ///  + faves_boost * min(1, faves / 10)`. Absent dimensions or
    /// popularity contribute nothing.
    pub fn score(&self, candidate: &MediaCandidate) -> f64 {
        let mut score = self.weight(candidate.source);

        if let Some(min_dim) = candidate.min_dimension() {
            score += self.dimension_boost * (f64::from(min_dim) / DIMENSION_SATURATION).min(1.0);
        }

        if let Some(faves) = candidate.metadata.faves_count() {
            score += self.faves_boost * (f64::from(faves) / FAVES_SATURATION).min(1.0);
        }

        score
    }
}

fn by_score_desc(a: &MediaCandidate, b: &MediaCandidate) -> Ordering {
    b.score_or_zero().total_cmp(&a.score_or_zero())
}

/// Scores every candidate and sorts them best first (stable)
pub fn score_candidates(rules: &SelectionRules, mut candidates: Vec<MediaCandidate>) -> Vec<MediaCandidate> {
    for candidate in &mut candidates {
        candidate.score = Some(rules.score(candidate));
    }
    candidates.sort_by(by_score_desc);
    candidates
}

/// Picks a bounded, source-diverse subset of scored candidates
///
/// Takes the best `cap(source)` from each source, re-sorts the union by
/// score and truncates to `desired_per_species`.
pub fn select_top(rules: &SelectionRules, candidates: Vec<MediaCandidate>) -> Vec<MediaCandidate> {
    let mut by_source: Vec<(Source, Vec<MediaCandidate>)> = Vec::new();
    for candidate in candidates {
        match by_source.iter_mut().find(|(s, _)| *s == candidate.source) {
            Some((_, bucket)) => bucket.push(candidate),
            None => by_source.push((candidate.source, vec![candidate])),
        }
    }

    let mut selected = Vec::new();
    for (source, mut bucket) in by_source {
        bucket.sort_by(by_score_desc);
        bucket.truncate(rules.cap(source));
        selected.extend(bucket);
    }

    selected.sort_by(by_score_desc);
    selected.truncate(rules.desired_per_species);
    selected
}

/// Index of the hero image: highest score, then largest area, then first
pub fn hero_index(images: &[MediaCandidate]) -> usize {
    let mut best = 0;
    for (i, image) in images.iter().enumerate().skip(1) {
        let current = &images[best];
        match image.score_or_zero().total_cmp(&current.score_or_zero()) {
            Ordering::Greater => best = i,
            Ordering::Equal if image.pixel_area() > current.pixel_area() => best = i,
            _ => {}
        }
    }
    best
}
