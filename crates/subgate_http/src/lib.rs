//! Minimal HTTP/1.1 plumbing for the inbound side of the gateway:
//! request reading and parsing, query-string decoding, response writers.

use tokio::io::{AsyncRead, AsyncWrite};

mod query;
mod request;
pub mod responses;

pub use query::{QueryParams, parse_target};
pub use request::{ParsedRequest, read_http_request};

pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
