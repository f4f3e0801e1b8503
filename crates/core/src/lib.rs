pub mod record;
pub mod similarity;
pub mod store;

pub use record::{HistoricalRecord, Record};
pub use store::{LedgerStore, ReadFilter, StoreError};
