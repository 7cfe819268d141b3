//! Silver layer - typed, deduplicated tables derived from Bronze.

mod chunk;
mod dedupe;
mod promotion_service;
mod silver_traits;

pub use chunk::{partition_by_date, ChunkStrategy, PromotionChunk};
pub use dedupe::{anti_join, dedupe_keep_last};
pub use promotion_service::PromotionEngine;
pub use silver_traits::{KeyCatalogTrait, SilverStoreTrait};
