//! Run statistics and console rendering of QA results

use crate::output::qa::QaReport;
use std::time::Duration;

/// Counters accumulated over one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    /// Species whose unit of work finished
    pub species_processed: usize,

    /// Candidates returned by the harvesters, before processing
    pub candidates_harvested: usize,

    /// Images kept across all manifest entries written this run
    pub images_selected: usize,

    /// Errors recorded against units of work
    pub errors: Vec<String>,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average images kept per species that produced an entry
    pub fn images_per_species(&self) -> f64 {
        if self.species_processed == 0 {
            0.0
        } else {
            self.images_selected as f64 / self.species_processed as f64
        }
    }

    /// Logs the end-of-run summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Summary ===");
        tracing::info!("Duration: {:.1}s", self.duration.as_secs_f64());
        tracing::info!("Species processed: {}", self.species_processed);
        tracing::info!("Candidates harvested: {}", self.candidates_harvested);
        tracing::info!(
            "Images selected: {} ({:.2} per species)",
            self.images_selected,
            self.images_per_species()
        );
        if self.errors.is_empty() {
            tracing::info!("Errors: 0");
        } else {
            tracing::warn!("Errors: {}", self.errors.len());
            for error in &self.errors {
                tracing::warn!("  - {}", error);
            }
        }
    }
}

/// Prints a QA report to stdout
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_qa_report(report: &QaReport) {
    let coverage = &report.coverage;

    println!("=== Image Seeding Statistics ===\n");

    println!("Coverage ({} species):", coverage.total_species);
    for (label, count) in [
        ("0 images", coverage.species_with_0_images),
        ("1 image", coverage.species_with_1_images),
        ("2 images", coverage.species_with_2_images),
        ("3+ images", coverage.species_with_3_plus_images),
    ] {
        let percentage = if coverage.total_species > 0 {
            (count as f64 / coverage.total_species as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!();

    let licenses = &report.license_compliance;
    println!("Licenses:");
    println!("  CC0: {}", licenses.cc0_count);
    println!("  CC BY: {}", licenses.cc_by_count);
    println!("  CC BY-SA: {}", licenses.cc_by_sa_count);
    println!("  Disallowed: {}", licenses.disallowed_count);
    println!("  Unknown: {}", licenses.unknown_count);
    println!();

    let validation = &report.validation;
    println!("Validation:");
    println!(
        "  Schema valid: {}",
        if validation.schema_valid { "yes" } else { "no" }
    );
    println!("  Total images: {}", validation.total_images);
    println!("  Broken links: {}", validation.broken_links);
    println!(
        "  Average dimensions: {} x {}",
        validation.average_dimensions.width, validation.average_dimensions.height
    );

    let errors = &report.errors;
    if errors.taxon_errors + errors.api_errors + errors.download_errors > 0 {
        println!();
        println!("Errors:");
        println!("  Taxon resolution: {}", errors.taxon_errors);
        println!("  Provider API: {}", errors.api_errors);
        println!("  Image download: {}", errors.download_errors);
    }
}
