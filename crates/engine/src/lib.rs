pub mod api;
pub mod detect;
pub mod progress;
pub mod suggest;

mod error;

pub use api::{
    apply_category_decisions, detect_conflicts, insert_resolved, resolve_conflicts,
    suggest_categories,
};
pub use detect::{
    initialize_default_decisions, Candidate, Conflict, ConflictAnalysis, DetectorConfig,
    DuplicateDecision, MatchTier,
};
pub use error::EngineError;
pub use progress::{NoProgress, ProgressObserver, Stage};
pub use suggest::{
    initialize_decisions, planned_updates, CategoryAnalysis, CategoryDecision, CategoryUpdate,
    Evidence, MatchReason, ScoringConfig, Suggestion, UNKNOWN_CATEGORY,
};
