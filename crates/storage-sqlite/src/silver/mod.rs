//! Silver target-table persistence.

mod repository;

pub use repository::SilverTableRepository;
