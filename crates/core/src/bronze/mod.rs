//! Bronze layer - immutable capture of raw fetch results.

mod fetch_service;
mod payload_model;
mod payload_store;

pub use fetch_service::{BatchStats, FetchCoordinator, FetchOutcome};
pub use payload_model::{PayloadContent, RawPayload, RequestSnapshot};
pub use payload_store::PayloadStore;
