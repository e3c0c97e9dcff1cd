//! Run stage definitions for the orchestrator state machine
//!
//! A run moves through the stages in a fixed order. `Failed` can be entered
//! from any stage that has not already finished.

use crate::SeedError;
use std::fmt;

/// Represents where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    /// Configuration and taxonomy loaded, nothing fetched yet
    Init,

    /// Resolving provider taxon identifiers
    ResolveTaxa,

    /// Pulling candidates from the providers
    Harvest,

    /// Grouping, deduplicating, scoring and selecting
    Process,

    /// Merging results into the persisted manifest
    Manifest,

    /// Building the QA report
    Qa,

    // ===== Terminal States =====
    /// Run finished
    Done,

    /// Run aborted on an unrecoverable error
    Failed,
}

impl RunStage {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The stage that normally follows this one
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::ResolveTaxa),
            Self::ResolveTaxa => Some(Self::Harvest),
            Self::Harvest => Some(Self::Process),
            Self::Process => Some(Self::Manifest),
            Self::Manifest => Some(Self::Qa),
            Self::Qa => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Whether moving from `self` to `to` is allowed
    ///
    /// Besides the forward step, runs that work in units loop
    /// `Manifest → ResolveTaxa` for the next unit.
    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed
            || self.next() == Some(to)
            || (*self == Self::Manifest && to == Self::ResolveTaxa)
    }

    /// Validated transition
    pub fn transition(self, to: Self) -> Result<Self, SeedError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(SeedError::InvalidTransition { from: self, to })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ResolveTaxa => "resolve_taxa",
            Self::Harvest => "harvest",
            Self::Process => "process",
            Self::Manifest => "manifest",
            Self::Qa => "qa",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
