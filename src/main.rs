//! Species image seeder main entry point
//!
//! This is the command-line interface for the species image seeding pipeline.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use species_image_seeder::config::{load_config_with_hash, PipelineConfig};
use species_image_seeder::model::Source;
use species_image_seeder::output::print_qa_report;
use species_image_seeder::pipeline::{Orchestrator, RunMode, RunOutcome};
use tracing_subscriber::EnvFilter;

/// Species image seeder: harvests openly licensed species photos
///
/// Queries iNaturalist, Wikimedia Commons and GBIF for every species in the
/// taxonomy, keeps the best few images per species, and writes a manifest
/// plus a QA report. Long runs can be resumed from checkpoints.
#[derive(Parser, Debug)]
#[command(name = "species-image-seeder")]
#[command(version = "1.0.0")]
#[command(about = "Seeds a per-species image manifest from open biodiversity APIs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Process a single species by id and merge it into the manifest
    #[arg(long, value_name = "ID", group = "mode")]
    species: Option<String>,

    /// Resume from the checkpoint, one species at a time
    #[arg(long = "continue", group = "mode")]
    resume: bool,

    /// Resume in segments of `batching.segment_size` species
    #[arg(long, group = "mode")]
    segmented: bool,

    /// Process species missing from both the checkpoint and the manifest
    #[arg(long, group = "mode")]
    extend: bool,

    /// Process the next N remaining species as one batch
    #[arg(long, value_name = "N", group = "mode")]
    batch: Option<usize>,

    /// List species not yet completed and exit
    #[arg(long, group = "mode")]
    list_remaining: bool,

    /// Print QA statistics for the current manifest and exit
    #[arg(long, group = "mode")]
    report: bool,

    /// Ignore cached responses (fresh responses are still cached)
    #[arg(long)]
    refresh: bool,

    /// Discard the mode's progress before starting
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the planned work without fetching anything
    #[arg(long, conflicts_with_all = ["report", "list_remaining"])]
    dry_run: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if let Some(id) = &self.species {
            RunMode::Single(id.clone())
        } else if self.resume {
            RunMode::Resume
        } else if self.segmented {
            RunMode::Segmented
        } else if self.extend {
            RunMode::Extend
        } else if let Some(n) = self.batch {
            RunMode::Batch(n)
        } else if self.list_remaining {
            RunMode::ListRemaining
        } else {
            RunMode::Full
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        print_config(&config);
    }

    let mut orchestrator = Orchestrator::from_config(config, config_hash, cli.refresh)
        .context("failed to initialise pipeline")?;

    if cli.report {
        let report = orchestrator
            .report()
            .await
            .context("failed to build QA report")?;
        print_qa_report(&report);
        return Ok(());
    }

    let mode = cli.mode();
    let outcome = orchestrator
        .run(&mode, cli.fresh, cli.dry_run)
        .await
        .with_context(|| format!("{} run failed", mode))?;

    match outcome {
        RunOutcome::Remaining(ids) => {
            println!("{} species remaining:", ids.len());
            for id in ids {
                println!("  {}", id);
            }
        }
        RunOutcome::Planned(units) => {
            println!("\nPlanned units ({}):", units.len());
            for unit in &units {
                println!("  {}: {}", unit.label, unit.species_ids().join(", "));
            }
            println!("\n✓ Configuration is valid");
        }
        RunOutcome::Completed { stats, .. } => {
            if !stats.errors.is_empty() {
                tracing::warn!(
                    "Run finished with {} failed unit(s); rerun with --continue to retry them",
                    stats.errors.len()
                );
            }
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("species_image_seeder=info,warn"),
            1 => EnvFilter::new("species_image_seeder=debug,info"),
            2 => EnvFilter::new("species_image_seeder=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prints the settings a dry run would use
fn print_config(config: &PipelineConfig) {
    println!("=== Species Image Seeder Dry Run ===\n");

    println!("Sources:");
    for source in Source::all() {
        println!(
            "  {}: {} (weight {:.2}, cap {}, min interval {}ms, courtesy delay {}ms)",
            source,
            if config.is_source_enabled(source) { "enabled" } else { "disabled" },
            config.source_weight(source),
            config.max_per_source(source),
            config.min_request_interval(source.as_str()).as_millis(),
            config.courtesy_delay(source).as_millis()
        );
    }

    println!("\nImage Requirements:");
    println!("  Min dimension: {}px", config.image_requirements.min_dimension);
    println!(
        "  Desired per species: {}",
        config.image_requirements.desired_per_species
    );
    println!("  Allowed licenses: {}", config.allowed_licenses.join(", "));

    println!("\nCache:");
    println!(
        "  Disk caching: {} (TTL {}h) at {}",
        config.cache.enable_disk_caching,
        config.cache.cache_ttl_hours,
        config.paths.cache_dir.display()
    );

    println!("\nOutput:");
    println!("  Taxonomy: {}", config.paths.taxonomy.display());
    println!("  Manifest: {}", config.paths.manifest.display());
    println!("  QA report: {}", config.paths.qa_report.display());
    println!("  State: {}", config.paths.state_dir.display());
}
