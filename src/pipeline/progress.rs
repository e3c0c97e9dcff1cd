//! Persisted progress for resumable runs
//!
//! Each run mode keeps its own JSON checkpoint in the state directory. The
//! completed set only ever grows; it is flushed after every finished unit.

use crate::http::write_atomic;
use crate::pipeline::RunMode;
use crate::SeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Checkpoint of one run mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub completed: BTreeSet<String>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub current_batch: Option<usize>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub total_species: usize,
}

impl PipelineProgress {
    pub fn new(config_hash: impl Into<String>, total_species: usize) -> Self {
        let now = Utc::now();
        Self {
            completed: BTreeSet::new(),
            current: None,
            current_batch: None,
            errors: Vec::new(),
            started_at: now,
            last_updated: now,
            config_hash: config_hash.into(),
            total_species,
        }
    }

    pub fn is_completed(&self, species_id: &str) -> bool {
        self.completed.contains(species_id)
    }

    /// Marks a species as in flight
    pub fn start(&mut self, species_id: &str) {
        self.current = Some(species_id.to_string());
        self.touch();
    }

    /// Records a finished species and clears the in-flight marker
    pub fn complete(&mut self, species_id: &str) {
        self.completed.insert(species_id.to_string());
        if self.current.as_deref() == Some(species_id) {
            self.current = None;
        }
        self.touch();
    }

    /// Records a failed unit of work; the species stays remaining
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.current = None;
        self.touch();
    }

    /// Species ids from `all` not yet completed, in input order
    pub fn remaining<'a, I>(&self, all: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        all.into_iter()
            .filter(|id| !self.completed.contains(*id))
            .map(str::to_string)
            .collect()
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Location and lifecycle of one mode's progress file
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<state_dir>/<mode>-progress.json`
    pub fn for_mode(state_dir: &Path, mode: &RunMode) -> Self {
        Self::new(state_dir.join(format!("{}-progress.json", mode.progress_name())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint, or starts a new one when none exists
    ///
    /// A checkpoint written under a different configuration is still used;
    /// the mismatch is logged. An undecodable checkpoint is logged and
    /// replaced by a new one.
    pub async fn load_or_new(
        &self,
        config_hash: &str,
        total_species: usize,
    ) -> Result<PipelineProgress, SeedError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PipelineProgress::new(config_hash, total_species));
            }
            Err(e) => return Err(e.into()),
        };

        let mut progress: PipelineProgress = match serde_json::from_str(&raw) {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(
                    "Progress file {} is unreadable ({}); starting fresh",
                    self.path.display(),
                    e
                );
                return Ok(PipelineProgress::new(config_hash, total_species));
            }
        };
        if !progress.config_hash.is_empty() && progress.config_hash != config_hash {
            tracing::warn!(
                "Configuration changed since {} was written; continuing with the new settings",
                self.path.display()
            );
        }
        progress.config_hash = config_hash.to_string();
        progress.total_species = total_species;

        tracing::info!(
            "Loaded progress: {}/{} species completed, {} errors",
            progress.completed.len(),
            total_species,
            progress.errors.len()
        );
        Ok(progress)
    }

    /// Writes the checkpoint atomically
    pub async fn save(&self, progress: &PipelineProgress) -> Result<(), SeedError> {
        let json = serde_json::to_vec_pretty(progress)?;
        write_atomic(&self.path, &json).await?;
        Ok(())
    }

    /// Deletes the checkpoint if present
    pub async fn discard(&self) -> Result<(), SeedError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Discarded progress file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
