//! Outbound fetch against the conversion service.
//!
//! One [`Fetch`] seam so the gateway policy can be exercised without a
//! network; [`TcpFetcher`] is the real implementation, speaking plain
//! HTTP/1.1 over TCP. TLS transport is outside the core.

use async_trait::async_trait;
use thiserror::Error;

mod client;
mod response;

pub use client::TcpFetcher;

/// What one upstream GET produced: status code, headers in wire order,
/// body decoded to text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Issues one outbound GET and returns the response or an error. The
/// caller maps every error to a service-unavailable outcome; the variants
/// exist for operator logs.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid upstream url '{url}': {reason}")]
    BadUrl { url: String, reason: String },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("upstream timed out")]
    Timeout,

    #[error("upstream i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed upstream response: {0}")]
    Http(String),

    #[error("upstream returned status {status}")]
    BadStatus { status: u16 },

    #[error("upstream response exceeded {limit} bytes")]
    TooLarge { limit: usize },
}
