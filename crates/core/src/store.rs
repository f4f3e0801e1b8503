use thiserror::Error;

use crate::record::Record;

/// Row filter understood by every ledger backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFilter {
    /// Every row in the ledger.
    All,
    /// Only rows whose category is present and not a placeholder value.
    Categorized,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger not found: {0}")]
    LedgerNotFound(String),
    #[error("record {record_id} not found in ledger '{ledger}'")]
    RecordNotFound { ledger: String, record_id: i64 },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence collaborator. The engine never guesses table naming
/// conventions or issues queries itself; everything goes through this trait.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Names of all ledgers related to this account, used for whole-account
    /// history discovery.
    async fn list_related_ledgers(&self) -> Result<Vec<String>, StoreError>;

    /// Reads a ledger, ordered by date ascending.
    async fn read_ledger(&self, name: &str, filter: ReadFilter)
        -> Result<Vec<Record>, StoreError>;

    /// Appends records to a ledger, returning the assigned ids in order.
    async fn insert_records(&self, name: &str, records: &[Record])
        -> Result<Vec<i64>, StoreError>;

    /// Overwrites the category of one persisted record.
    async fn update_category(
        &self,
        name: &str,
        record_id: i64,
        category: &str,
    ) -> Result<(), StoreError>;
}
