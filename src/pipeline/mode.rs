use std::fmt;

/// How a run picks and groups its species
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Every species in one pass
    Full,
    /// One named species, merged into the existing manifest
    Single(String),
    /// Remaining species one at a time, checkpointed after each
    Resume,
    /// Remaining species in batches of `batching.segment_size`
    Segmented,
    /// The next `n` remaining species as one unit
    Batch(usize),
    /// Species missing from both progress and manifest, in batches of
    /// `batching.extend_batch_size`
    Extend,
    /// Print the remaining species and exit
    ListRemaining,
}

impl RunMode {
    /// Name used for the mode's progress file
    pub fn progress_name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Single(_) => "single",
            Self::Resume => "incremental",
            Self::Segmented => "segmented",
            Self::Batch(_) => "batch",
            Self::Extend => "extend",
            Self::ListRemaining => "incremental",
        }
    }

    /// Whether species are worked off in checkpointed units
    pub fn is_incremental(&self) -> bool {
        matches!(
            self,
            Self::Resume | Self::Segmented | Self::Batch(_) | Self::Extend
        )
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(id) => write!(f, "single ({})", id),
            Self::Batch(n) => write!(f, "batch ({})", n),
            Self::ListRemaining => write!(f, "list-remaining"),
            other => write!(f, "{}", other.progress_name()),
        }
    }
}
