//! Ingestion ledger persistence.

mod model;
mod repository;

pub use repository::LedgerRepository;
