//! Output module for the manifest, the media index and QA reports
//!
//! This module handles:
//! - Merging and writing the per-species manifest
//! - Appending to the media index audit trail
//! - Building the QA report and its markdown summary
//! - Downloading selected images when enabled

mod images;
mod manifest;
mod markdown;
mod qa;
pub mod stats;

pub use images::{download_selected_images, image_destination, url_extension};
pub use manifest::{append_media_index, load_manifest, merge_manifest, write_manifest, MergeStats};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use qa::{
    build_qa_report, check_entry, write_qa_report, AverageDimensions, Coverage, LicenseCompliance,
    QaErrors, QaReport, Validation,
};
pub use stats::{print_qa_report, RunStatistics};
