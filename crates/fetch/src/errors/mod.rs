//! Error types and retry classification for the fetch crate.
//!
//! This module provides:
//! - [`FetchError`]: the transport error taxonomy
//! - [`RetryClass`]: classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while talking to a market data API.
///
/// Each variant is classified via [`retry_class`](Self::retry_class), which
/// determines whether the executor re-issues the call.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request exceeded its connect or read timeout.
    #[error("Request timed out: {url}")]
    Timeout {
        /// The URL that timed out
        url: String,
    },

    /// The connection could not be established.
    #[error("Connection failed: {url} - {message}")]
    Connect {
        /// The URL that could not be reached
        url: String,
        /// The underlying connect error
        message: String,
    },

    /// The redirect limit was exceeded.
    #[error("Too many redirects: {url}")]
    TooManyRedirects {
        /// The URL that kept redirecting
        url: String,
    },

    /// A generic request failure not covered by the variants above.
    #[error("Request error: {message}")]
    Request {
        /// The underlying error message
        message: String,
    },

    /// The request URL or query could not be constructed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was malformed
        message: String,
    },

    /// All retry attempts were consumed without a successful call.
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        /// How many times the underlying call was invoked
        attempts: u32,
        /// The last error observed
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns the retry classification for this error.
    ///
    /// Transport-level failures (timeout, connect, redirect loop, generic
    /// request error) are transient and classified [`RetryClass::Retry`].
    /// Everything else is terminal.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout { .. }
            | Self::Connect { .. }
            | Self::TooManyRedirects { .. }
            | Self::Request { .. } => RetryClass::Retry,

            Self::InvalidRequest { .. } | Self::RetryExhausted { .. } => RetryClass::Never,
        }
    }

    /// Maps a reqwest error to the taxonomy, keeping the requested URL for
    /// the message.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_redirect() {
            Self::TooManyRedirects {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retried() {
        let error = FetchError::Timeout {
            url: "https://api.example.com/v3/quote".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
    }

    #[test]
    fn test_connect_is_retried() {
        let error = FetchError::Connect {
            url: "https://api.example.com".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
    }

    #[test]
    fn test_redirect_loop_is_retried() {
        let error = FetchError::TooManyRedirects {
            url: "https://api.example.com".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
    }

    #[test]
    fn test_generic_request_is_retried() {
        let error = FetchError::Request {
            message: "connection reset by peer".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
    }

    #[test]
    fn test_invalid_request_never_retries() {
        let error = FetchError::InvalidRequest {
            message: "empty endpoint".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_exhausted_never_retries() {
        let error = FetchError::RetryExhausted {
            attempts: 3,
            source: Box::new(FetchError::Timeout {
                url: "https://api.example.com".to_string(),
            }),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_error_display() {
        let error = FetchError::Timeout {
            url: "https://api.example.com/v3/quote".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Request timed out: https://api.example.com/v3/quote"
        );

        let error = FetchError::RetryExhausted {
            attempts: 3,
            source: Box::new(FetchError::Request {
                message: "reset".to_string(),
            }),
        };
        assert_eq!(
            format!("{}", error),
            "Retries exhausted after 3 attempts: Request error: reset"
        );
    }
}
