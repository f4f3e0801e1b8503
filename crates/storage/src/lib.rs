pub mod db;

pub use db::{DbPool, SqliteLedgerStore};
