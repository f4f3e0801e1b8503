use std::fmt;
use std::time::Duration;

/// Phases of a category suggestion run, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Whole-account ledger discovery.
    DiscoverLedgers,
    /// Per-ledger fetch of categorized history.
    FetchHistory,
    /// Scoring candidates against the history.
    Score,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DiscoverLedgers => write!(f, "discover-ledgers"),
            Stage::FetchHistory => write!(f, "fetch-history"),
            Stage::Score => write!(f, "score"),
        }
    }
}

/// Injected observer for long suggestion runs. Purely observational: nothing
/// an implementation does can change the outcome of the analysis.
pub trait ProgressObserver {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}

    /// Invoked once per candidate during the scoring stage.
    fn item_scored(&self, _completed: usize, _total: usize) {}
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
