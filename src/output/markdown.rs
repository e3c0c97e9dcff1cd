//! Markdown rendering of the QA report
//!
//! This module produces the human-readable companion of the JSON QA report:
//! coverage, license breakdown, validation results and error counts.

use crate::http::write_atomic;
use crate::output::qa::QaReport;
use crate::SeedError;
use std::path::Path;

/// Writes the markdown QA summary
///
/// # Arguments
///
/// * `report` - The QA report to render
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the summary
/// * `Err(SeedError)` - Failed to write the summary
pub async fn generate_markdown_summary(report: &QaReport, output_path: &Path) -> Result<(), SeedError> {
    let markdown = format_markdown_summary(report);
    write_atomic(output_path, markdown.as_bytes()).await?;
    Ok(())
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Formats a QA report as markdown
pub fn format_markdown_summary(report: &QaReport) -> String {
    let mut md = String::new();
    let coverage = &report.coverage;
    let licenses = &report.license_compliance;
    let validation = &report.validation;

    md.push_str("# Species Image Seeding QA Report\n\n");
    md.push_str(&format!(
        "- **Generated**: {}\n\n",
        report.generated_at.to_rfc3339()
    ));

    // Coverage
    md.push_str("## Coverage\n\n");
    md.push_str(&format!("- **Total Species**: {}\n\n", coverage.total_species));
    md.push_str("| Images | Species | Share |\n");
    md.push_str("|--------|---------|-------|\n");
    for (label, count) in [
        ("0", coverage.species_with_0_images),
        ("1", coverage.species_with_1_images),
        ("2", coverage.species_with_2_images),
        ("3+", coverage.species_with_3_plus_images),
    ] {
        md.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            label,
            count,
            percent(count, coverage.total_species)
        ));
    }
    md.push('\n');

    // Licenses
    md.push_str("## License Compliance\n\n");
    md.push_str("| License | Images |\n");
    md.push_str("|---------|--------|\n");
    md.push_str(&format!("| CC0 | {} |\n", licenses.cc0_count));
    md.push_str(&format!("| CC BY | {} |\n", licenses.cc_by_count));
    md.push_str(&format!("| CC BY-SA | {} |\n", licenses.cc_by_sa_count));
    md.push_str(&format!("| Disallowed | {} |\n", licenses.disallowed_count));
    md.push_str(&format!("| Unknown | {} |\n\n", licenses.unknown_count));

    if licenses.disallowed_count > 0 {
        md.push_str("> **Warning**: the manifest contains images with disallowed licenses.\n\n");
    }

    // Validation
    md.push_str("## Validation\n\n");
    md.push_str(&format!(
        "- **Schema Valid**: {}\n",
        if validation.schema_valid { "yes" } else { "no" }
    ));
    md.push_str(&format!("- **Total Images**: {}\n", validation.total_images));
    md.push_str(&format!("- **Broken Links**: {}\n", validation.broken_links));
    md.push_str(&format!(
        "- **Average Dimensions**: {} x {}\n\n",
        validation.average_dimensions.width, validation.average_dimensions.height
    ));

    // Errors
    md.push_str("## Errors\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    md.push_str(&format!("| Taxon resolution | {} |\n", report.errors.taxon_errors));
    md.push_str(&format!("| Provider API | {} |\n", report.errors.api_errors));
    md.push_str(&format!("| Image download | {} |\n", report.errors.download_errors));

    md
}
