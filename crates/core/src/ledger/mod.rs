//! The ingestion ledger - the source of truth for what has been fetched,
//! what can be promoted, and incremental watermarks.

mod ledger_model;
mod ledger_traits;

pub use ledger_model::{LedgerEntry, Stage};
pub use ledger_traits::LedgerRepositoryTrait;
