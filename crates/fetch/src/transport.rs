//! HTTP transport seam.
//!
//! The pipeline talks to the network through the [`HttpTransport`] trait so
//! the fetch coordinator can be driven by a fake transport in tests.
//! [`ReqwestTransport`] is the production implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::errors::FetchError;

/// The transport envelope of one HTTP exchange.
///
/// Statuses other than 200 are data, not errors: the Bronze layer archives
/// failed responses too, so the transport only fails on conditions where no
/// response envelope exists at all.
#[derive(Clone, Debug)]
pub struct TransportReply {
    pub status: u16,
    pub reason: String,
    /// Response headers rendered `key=value; key=value`.
    pub headers: String,
    pub body: String,
    pub elapsed_ms: u64,
}

/// Abstraction over the HTTP client.
///
/// Implement this trait to substitute the network in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a GET and returns the full transport envelope.
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportReply, FetchError>;
}

/// Production transport over a shared reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds the client with the run's connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| FetchError::Request {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn render_headers(headers: &reqwest::header::HeaderMap) -> String {
        headers
            .iter()
            .map(|(name, value)| {
                format!("{}={}", name, value.to_str().unwrap_or("<binary>"))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportReply, FetchError> {
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let headers = Self::render_headers(response.headers());

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(TransportReply {
            status: status.as_u16(),
            reason,
            headers,
            body,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
