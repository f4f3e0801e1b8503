use thiserror::Error;

use tally_core::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The existing-record fetch for duplicate detection failed. This is
    /// never degraded to an empty set: assuming an empty ledger would mark
    /// every candidate safe and reintroduce the duplicates.
    #[error("failed to read existing records from ledger '{ledger}'")]
    ExistingFetch {
        ledger: String,
        #[source]
        source: StoreError,
    },

    /// A category update failed partway through a batch. Updates applied
    /// before the failure stay committed; `applied` reports how many.
    #[error(
        "category update for record {record_id} in ledger '{ledger}' failed \
         after {applied} successful updates"
    )]
    ApplyFailed {
        ledger: String,
        record_id: i64,
        applied: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
