//! Tidemark Fetch - throttled, retrying HTTP access to market data APIs.
//!
//! This crate owns everything between the pipeline and the network:
//! - [`SlidingWindowThrottle`]: bounds the call rate inside a sliding window
//! - [`RequestExecutor`]: retry-with-backoff wrapper around throttled calls
//! - [`HttpTransport`]: the transport seam (reqwest in production, fakes in tests)
//! - [`FetchError`]: the transport error taxonomy with retry classification

pub mod errors;
pub mod executor;
pub mod throttle;
pub mod transport;

pub use errors::{FetchError, RetryClass};
pub use executor::{RequestExecutor, RetryPolicy};
pub use throttle::{SlidingWindowThrottle, ThrottleConfig, ThrottleStats};
pub use transport::{HttpTransport, ReqwestTransport, TransportReply};
