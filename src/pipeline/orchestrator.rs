//! Pipeline orchestrator - sequences a run over units of work
//!
//! A run loads the species list, picks the units its mode calls for, and for
//! each unit resolves taxa, harvests, processes and merges the result into
//! the manifest. Progress is checkpointed after every unit so an interrupted
//! run picks up where it stopped. The QA report is written once at the end.

use crate::config::PipelineConfig;
use crate::harvest::{save_taxa_cache, HarvesterSet, TaxaResolution};
use crate::http::CachedHttpClient;
use crate::model::{load_taxonomy, SpeciesImages, SpeciesTaxonomy};
use crate::output::{
    append_media_index, build_qa_report, download_selected_images, generate_markdown_summary,
    load_manifest, merge_manifest, write_manifest, write_qa_report, QaErrors, QaReport,
    RunStatistics,
};
use crate::pipeline::{PipelineProgress, ProgressStore, RunMode, RunStage};
use crate::process::CandidateProcessor;
use crate::SeedError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Species worked on together and checkpointed together
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub label: String,
    pub batch: Option<usize>,
    pub species: Vec<SpeciesTaxonomy>,
}

impl WorkUnit {
    pub fn species_ids(&self) -> Vec<String> {
        self.species.iter().map(|s| s.species_id.clone()).collect()
    }
}

/// What a finished run hands back to the caller
#[derive(Debug)]
pub enum RunOutcome {
    /// The run went through all its units and wrote the QA report
    Completed {
        stats: RunStatistics,
        report: QaReport,
    },
    /// Species not yet completed, for `RunMode::ListRemaining`
    Remaining(Vec<String>),
    /// The units a dry run would have processed
    Planned(Vec<WorkUnit>),
}

/// Main pipeline orchestrator structure
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    config_hash: String,
    taxonomy: Vec<SpeciesTaxonomy>,
    client: Arc<CachedHttpClient>,
    harvesters: HarvesterSet,
    processor: CandidateProcessor,
    stage: RunStage,
    taxon_errors: usize,
    download_errors: usize,
}

impl Orchestrator {
    /// Creates an orchestrator, loading the taxonomy named in the config
    ///
    /// # Arguments
    ///
    /// * `config` - The pipeline configuration
    /// * `config_hash` - Hash of the config file, recorded in progress files
    /// * `refresh` - Bypass cache reads for this run
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(SeedError)` - The taxonomy or HTTP client could not be set up
    pub fn from_config(
        config: PipelineConfig,
        config_hash: impl Into<String>,
        refresh: bool,
    ) -> Result<Self, SeedError> {
        let taxonomy = load_taxonomy(&config.paths.taxonomy)?;
        Self::new(config, config_hash, taxonomy, refresh)
    }

    /// Creates an orchestrator over an already loaded species list
    ///
    /// Testing mode truncates the list here.
    pub fn new(
        config: PipelineConfig,
        config_hash: impl Into<String>,
        mut taxonomy: Vec<SpeciesTaxonomy>,
        refresh: bool,
    ) -> Result<Self, SeedError> {
        if let Some(limit) = config.species_limit() {
            if taxonomy.len() > limit {
                tracing::info!("Testing mode: limiting run to {} species", limit);
                taxonomy.truncate(limit);
            }
        }

        let client = Arc::new(CachedHttpClient::from_config(&config, refresh)?);
        let harvesters = HarvesterSet::from_config(&config, Arc::clone(&client));
        let processor = CandidateProcessor::from_config(&config);

        tracing::info!(
            "Loaded {} species; enabled sources: {}",
            taxonomy.len(),
            harvesters
                .enabled_sources()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            taxonomy,
            client,
            harvesters,
            processor,
            stage: RunStage::Init,
            taxon_errors: 0,
            download_errors: 0,
        })
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn taxonomy(&self) -> &[SpeciesTaxonomy] {
        &self.taxonomy
    }

    pub fn client(&self) -> &CachedHttpClient {
        &self.client
    }

    fn enter(&mut self, to: RunStage) -> Result<(), SeedError> {
        self.stage = self.stage.transition(to)?;
        tracing::debug!("Stage: {}", self.stage);
        Ok(())
    }

    fn fail(&mut self, error: SeedError) -> SeedError {
        if self.stage.can_transition_to(RunStage::Failed) {
            self.stage = RunStage::Failed;
        }
        tracing::error!("Run failed: {}", error);
        error
    }

    /// Runs the pipeline in `mode`
    ///
    /// # Arguments
    ///
    /// * `mode` - Which species to work on and how to group them
    /// * `fresh` - Discard the mode's progress before starting
    /// * `dry_run` - Only plan the units; no network or disk writes
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - The run finished, possibly with per-unit errors
    /// * `Err(SeedError)` - An unrecoverable failure stopped the run
    pub async fn run(&mut self, mode: &RunMode, fresh: bool, dry_run: bool) -> Result<RunOutcome, SeedError> {
        let store = ProgressStore::for_mode(&self.config.paths.state_dir, mode);

        if fresh && !dry_run {
            store.discard().await?;
        }

        let mut progress = if fresh {
            PipelineProgress::new(&self.config_hash, self.taxonomy.len())
        } else {
            store
                .load_or_new(&self.config_hash, self.taxonomy.len())
                .await?
        };

        if *mode == RunMode::ListRemaining {
            let remaining = progress.remaining(self.taxonomy.iter().map(|s| s.species_id.as_str()));
            return Ok(RunOutcome::Remaining(remaining));
        }

        let wholesale = *mode == RunMode::Full;
        let mut manifest = if wholesale {
            Vec::new()
        } else {
            load_manifest(&self.config.paths.manifest).await?
        };
        let units = self.plan_units(mode, &progress, &manifest)?;

        if dry_run {
            for unit in &units {
                tracing::info!(
                    "[dry run] {}: {}",
                    unit.label,
                    unit.species_ids().join(", ")
                );
            }
            return Ok(RunOutcome::Planned(units));
        }

        if units.is_empty() {
            tracing::info!("All species completed for mode {}; nothing to do", mode);
        } else {
            tracing::info!(
                "Starting {} run: {} species in {} unit(s)",
                mode,
                units.iter().map(|u| u.species.len()).sum::<usize>(),
                units.len()
            );
        }

        let started = Instant::now();
        let mut stats = RunStatistics::new();
        let unit_count = units.len();
        for (i, unit) in units.into_iter().enumerate() {
            self.enter(RunStage::ResolveTaxa)?;
            tracing::info!("=== {} ({}/{}) ===", unit.label, i + 1, unit_count);

            progress.current_batch = unit.batch;
            manifest = self
                .run_unit(mode, &unit, manifest, &mut progress, &store, &mut stats)
                .await?;
        }

        // Qa requires the manifest stage; an empty plan walks straight there.
        while self.stage != RunStage::Manifest {
            let Some(next) = self.stage.next() else { break };
            self.enter(next)?;
        }
        self.enter(RunStage::Qa)?;

        let report = self.write_reports(&manifest).await;
        self.enter(RunStage::Done)?;

        stats.duration = started.elapsed();
        stats.log_summary();

        Ok(RunOutcome::Completed { stats, report })
    }

    /// Splits the species this mode covers into units of work
    pub fn plan_units(
        &self,
        mode: &RunMode,
        progress: &PipelineProgress,
        manifest: &[SpeciesImages],
    ) -> Result<Vec<WorkUnit>, SeedError> {
        let remaining = || -> Vec<SpeciesTaxonomy> {
            self.taxonomy
                .iter()
                .filter(|s| !progress.is_completed(&s.species_id))
                .cloned()
                .collect()
        };

        let units = match mode {
            RunMode::Full => vec![WorkUnit {
                label: "Full run".to_string(),
                batch: None,
                species: self.taxonomy.clone(),
            }],
            RunMode::Single(id) => {
                let species = self
                    .taxonomy
                    .iter()
                    .find(|s| &s.species_id == id)
                    .cloned()
                    .ok_or_else(|| SeedError::UnknownSpecies(id.clone()))?;
                vec![WorkUnit {
                    label: format!("Species {}", id),
                    batch: None,
                    species: vec![species],
                }]
            }
            RunMode::Resume => remaining()
                .into_iter()
                .map(|s| WorkUnit {
                    label: format!("Species {}", s.species_id),
                    batch: None,
                    species: vec![s],
                })
                .collect(),
            RunMode::Segmented => chunk_units(remaining(), self.config.batching.segment_size, "Segment"),
            RunMode::Batch(n) => {
                let species: Vec<_> = remaining().into_iter().take(*n).collect();
                if species.is_empty() {
                    Vec::new()
                } else {
                    vec![WorkUnit {
                        label: format!("Batch of {}", species.len()),
                        batch: Some(1),
                        species,
                    }]
                }
            }
            RunMode::Extend => {
                let in_manifest: HashSet<&str> =
                    manifest.iter().map(|e| e.species_id.as_str()).collect();
                let species: Vec<_> = remaining()
                    .into_iter()
                    .filter(|s| !in_manifest.contains(s.species_id.as_str()))
                    .collect();
                chunk_units(species, self.config.batching.extend_batch_size, "Extend batch")
            }
            RunMode::ListRemaining => Vec::new(),
        };

        Ok(units)
    }

    /// One unit: resolve, harvest, process, merge, checkpoint
    ///
    /// Returns the updated manifest. Only `Full` and `Single` turn a
    /// resolution failure into a run failure; the unit-based modes record it
    /// and harvest the providers that search by name.
    async fn run_unit(
        &mut self,
        mode: &RunMode,
        unit: &WorkUnit,
        manifest: Vec<SpeciesImages>,
        progress: &mut PipelineProgress,
        store: &ProgressStore,
        stats: &mut RunStatistics,
    ) -> Result<Vec<SpeciesImages>, SeedError> {
        let resolution = match self.resolve_unit(unit).await {
            Ok(resolution) => resolution,
            Err(e @ SeedError::NoTaxaResolved { .. }) if mode.is_incremental() => {
                let message = format!("{}: {}", unit.label, e);
                tracing::warn!("{}; harvesting by name only", message);
                progress.record_error(message);
                TaxaResolution::default()
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.enter(RunStage::Harvest)?;
        let mut harvested = Vec::new();
        for species in &unit.species {
            progress.start(&species.species_id);
            self.checkpoint(store, progress).await;

            tracing::info!("Harvesting {}", species.canonical_name);
            let candidates = self
                .harvesters
                .harvest_species(species, resolution.taxon_for(&species.species_id))
                .await;

            if let Err(e) = append_media_index(&self.config.paths.media_index, &candidates).await {
                tracing::warn!("Failed to append to media index: {}", e);
            }
            stats.candidates_harvested += candidates.len();
            harvested.extend(candidates);
        }

        self.enter(RunStage::Process)?;
        let fresh = self.processor.process(harvested, &unit.species);
        stats.images_selected += fresh.iter().map(|e| e.images.len()).sum::<usize>();

        self.enter(RunStage::Manifest)?;
        let scope = unit.species_ids();
        let (merged, merge_stats) = merge_manifest(manifest, fresh.clone(), &scope);
        tracing::info!(
            "Manifest merge: {} added, {} replaced, {} retained",
            merge_stats.added,
            merge_stats.replaced,
            merge_stats.retained
        );

        if let Err(e) = write_manifest(&self.config.paths.manifest, &merged).await {
            let message = format!("{}: failed to write manifest: {}", unit.label, e);
            tracing::error!("{}", message);
            stats.errors.push(message.clone());
            progress.record_error(message);
            self.checkpoint(store, progress).await;
            return Ok(merged);
        }

        if self.config.cache.download_images {
            self.download_errors += download_selected_images(
                &self.client,
                &fresh,
                &self.config.paths.image_dir,
                &self.config.cache.image_formats,
            )
            .await;
        }

        for id in &scope {
            progress.complete(id);
        }
        stats.species_processed += scope.len();
        self.checkpoint(store, progress).await;

        tracing::info!(
            "Progress: {}/{} species completed",
            progress.completed.len(),
            progress.total_species
        );
        Ok(merged)
    }

    /// Resolves the unit's species to iNaturalist taxa
    ///
    /// Skipped when iNaturalist is disabled. Otherwise a unit in which no
    /// species resolves fails with `NoTaxaResolved`.
    async fn resolve_unit(&mut self, unit: &WorkUnit) -> Result<TaxaResolution, SeedError> {
        let Some(inaturalist) = self.harvesters.inaturalist.as_ref() else {
            return Ok(TaxaResolution::default());
        };

        let resolution = inaturalist.resolve_taxa(&unit.species).await;
        self.taxon_errors += resolution.errors.len();

        if !resolution.resolved.is_empty() {
            let path = self.config.paths.state_dir.join("taxa.json");
            if let Err(e) = save_taxa_cache(&path, &resolution.resolved).await {
                tracing::warn!("Failed to save taxa cache {}: {}", path.display(), e);
            }
        }

        if resolution.resolved.is_empty() && !unit.species.is_empty() {
            return Err(SeedError::NoTaxaResolved {
                scope: unit.label.clone(),
            });
        }

        Ok(resolution)
    }

    async fn checkpoint(&self, store: &ProgressStore, progress: &PipelineProgress) {
        if let Err(e) = store.save(progress).await {
            tracing::error!("Failed to save progress to {}: {}", store.path().display(), e);
        }
    }

    /// Error counts collected so far in this run
    pub fn qa_errors(&self) -> QaErrors {
        QaErrors {
            taxon_errors: self.taxon_errors,
            download_errors: self.download_errors,
            api_errors: self.client.failure_count() as usize,
        }
    }

    /// Builds the QA report over the whole species list and writes it
    async fn write_reports(&self, manifest: &[SpeciesImages]) -> QaReport {
        let report = build_qa_report(manifest, &self.taxonomy, &self.config, self.qa_errors());

        if let Err(e) = write_qa_report(&self.config.paths.qa_report, &report).await {
            tracing::error!("Failed to write QA report: {}", e);
        }
        if let Err(e) = generate_markdown_summary(&report, &self.config.paths.qa_summary).await {
            tracing::error!("Failed to write QA summary: {}", e);
        }

        report
    }

    /// QA report computed from the manifest currently on disk
    pub async fn report(&self) -> Result<QaReport, SeedError> {
        let manifest = load_manifest(&self.config.paths.manifest).await?;
        Ok(build_qa_report(
            &manifest,
            &self.taxonomy,
            &self.config,
            QaErrors::default(),
        ))
    }
}

fn chunk_units(species: Vec<SpeciesTaxonomy>, size: usize, label: &str) -> Vec<WorkUnit> {
    species
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| WorkUnit {
            label: format!("{} {}", label, i + 1),
            batch: Some(i + 1),
            species: chunk.to_vec(),
        })
        .collect()
}
