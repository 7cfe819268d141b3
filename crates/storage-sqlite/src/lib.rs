//! SQLite storage implementation for Tidemark.
//!
//! This crate is the only place in the pipeline where SQLite exists. All
//! other crates are database-agnostic and work with the traits defined in
//! `tidemark-core`. It contains:
//! - The single-writer actor that serializes every store mutation
//! - The ingestion ledger repository
//! - The dynamic Silver target-table repository
//! - The key catalog reader backing discovery
//!
//! # Architecture
//!
//! ```text
//! core (domain)      fetch (transport)
//!       │                  │
//!       └────────┬─────────┘
//!                │
//!                ▼
//!        storage-sqlite (this crate)
//!                │
//!                ▼
//!            SQLite DB
//! ```
//!
//! The ledger has a fixed schema created on open; every Silver target
//! table is created at runtime from the first projected chunk, so the
//! repository speaks dynamic SQL throughout.

pub mod db;
pub mod errors;
pub mod keys;
pub mod ledger;
pub mod silver;

// Re-export database utilities
pub use db::{init, open, open_in_memory, spawn_writer, StoreHandle};

// Re-export storage errors
pub use errors::StorageError;

// Re-export the repositories
pub use keys::KeyCatalogRepository;
pub use ledger::LedgerRepository;
pub use silver::SilverTableRepository;
