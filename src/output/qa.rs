//! QA report: coverage, license compliance and manifest validation

use crate::config::PipelineConfig;
use crate::harvest::LicenseClass;
use crate::http::write_atomic;
use crate::model::{SpeciesImages, SpeciesTaxonomy, Source};
use crate::SeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How many species ended up with 0, 1, 2 or 3+ images
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub total_species: usize,
    pub species_with_0_images: usize,
    pub species_with_1_images: usize,
    pub species_with_2_images: usize,
    pub species_with_3_plus_images: usize,
}

impl Coverage {
    fn record(&mut self, image_count: usize) {
        self.total_species += 1;
        match image_count {
            0 => self.species_with_0_images += 1,
            1 => self.species_with_1_images += 1,
            2 => self.species_with_2_images += 1,
            _ => self.species_with_3_plus_images += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCompliance {
    pub cc0_count: usize,
    pub cc_by_count: usize,
    pub cc_by_sa_count: usize,
    pub disallowed_count: usize,
    pub unknown_count: usize,
}

impl LicenseCompliance {
    fn record(&mut self, class: LicenseClass) {
        match class {
            LicenseClass::Cc0 => self.cc0_count += 1,
            LicenseClass::CcBy => self.cc_by_count += 1,
            LicenseClass::CcBySa => self.cc_by_sa_count += 1,
            LicenseClass::Disallowed => self.disallowed_count += 1,
            LicenseClass::Unknown => self.unknown_count += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub schema_valid: bool,
    pub broken_links: usize,
    pub total_images: usize,
    pub average_dimensions: AverageDimensions,
}

/// Error counts gathered during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaErrors {
    pub taxon_errors: usize,
    pub download_errors: usize,
    pub api_errors: usize,
}

/// The full QA report written next to the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    pub coverage: Coverage,
    pub license_compliance: LicenseCompliance,
    pub validation: Validation,
    pub errors: QaErrors,
    pub generated_at: DateTime<Utc>,
}

/// Builds the QA report for the species in `scope`
///
/// A species in scope without a manifest entry counts as having 0 images.
/// Manifest entries outside `scope` are ignored.
pub fn build_qa_report(
    manifest: &[SpeciesImages],
    scope: &[SpeciesTaxonomy],
    config: &PipelineConfig,
    errors: QaErrors,
) -> QaReport {
    let by_id: HashMap<&str, &SpeciesImages> = manifest
        .iter()
        .map(|entry| (entry.species_id.as_str(), entry))
        .collect();

    let mut coverage = Coverage::default();
    let mut licenses = LicenseCompliance::default();
    let mut total_images = 0usize;
    let mut broken_links = 0usize;
    let mut schema_valid = true;
    let (mut width_sum, mut height_sum, mut sized) = (0u64, 0u64, 0u64);

    for species in scope {
        let Some(entry) = by_id.get(species.species_id.as_str()) else {
            coverage.record(0);
            continue;
        };

        coverage.record(entry.images.len());

        if let Err(problem) = check_entry(entry, config) {
            tracing::warn!("Manifest entry {} is invalid: {}", entry.species_id, problem);
            schema_valid = false;
        }

        for image in &entry.images {
            total_images += 1;
            licenses.record(LicenseClass::classify(&image.license, &config.disallowed_licenses));

            if !is_http_url(&image.full_url) {
                broken_links += 1;
            }

            if let (Some(w), Some(h)) = (image.width, image.height) {
                width_sum += u64::from(w);
                height_sum += u64::from(h);
                sized += 1;
            }
        }
    }

    let average_dimensions = if sized > 0 {
        AverageDimensions {
            width: (width_sum as f64 / sized as f64).round() as u32,
            height: (height_sum as f64 / sized as f64).round() as u32,
        }
    } else {
        AverageDimensions::default()
    };

    QaReport {
        coverage,
        license_compliance: licenses,
        validation: Validation {
            schema_valid,
            broken_links,
            total_images,
            average_dimensions,
        },
        errors,
        generated_at: Utc::now(),
    }
}

/// Checks one manifest entry against the selection invariants
pub fn check_entry(entry: &SpeciesImages, config: &PipelineConfig) -> Result<(), String> {
    if entry.images.is_empty() {
        return Err("entry has no images".to_string());
    }
    if entry.hero_index >= entry.images.len() {
        return Err(format!(
            "hero_index {} out of range for {} images",
            entry.hero_index,
            entry.images.len()
        ));
    }
    if entry.images.len() > config.image_requirements.desired_per_species {
        return Err(format!(
            "{} images exceeds desired_per_species {}",
            entry.images.len(),
            config.image_requirements.desired_per_species
        ));
    }
    for source in Source::all() {
        let count = entry.count_from(source);
        if count > config.max_per_source(source) {
            return Err(format!(
                "{} images from {} exceeds cap {}",
                count,
                source,
                config.max_per_source(source)
            ));
        }
    }
    Ok(())
}

fn is_http_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

/// Writes the report as pretty JSON
pub async fn write_qa_report(path: &Path, report: &QaReport) -> Result<(), SeedError> {
    let json = serde_json::to_vec_pretty(report)?;
    write_atomic(path, &json).await?;
    tracing::info!("QA report saved to {}", path.display());
    Ok(())
}
