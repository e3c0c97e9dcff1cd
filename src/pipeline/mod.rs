//! Pipeline orchestration
//!
//! This module sequences a run: taxon resolution, harvesting, processing,
//! manifest merging and QA, over units of work chosen by the run mode.
//!
//! # Components
//!
//! - `RunStage`: The run state machine with validated transitions
//! - `RunMode`: Which species a run covers and how they are grouped
//! - `PipelineProgress` / `ProgressStore`: Per-mode checkpoints on disk
//! - `Orchestrator`: Drives a run end to end

mod mode;
mod orchestrator;
mod progress;
mod stage;

pub use mode::RunMode;
pub use orchestrator::{Orchestrator, RunOutcome, WorkUnit};
pub use progress::{PipelineProgress, ProgressStore};
pub use stage::RunStage;
