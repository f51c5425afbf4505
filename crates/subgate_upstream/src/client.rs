use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

use subgate_config::UpstreamConfig;

use crate::response::read_response;
use crate::{Fetch, FetchError, FetchedResponse};

/// Plain HTTP/1.1 client for the conversion service. One connection per
/// fetch; the response is fully buffered before it is returned.
pub struct TcpFetcher {
    user_agent: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_headers: usize,
    max_body: usize,
}

impl TcpFetcher {
    pub fn from_config(cfg: &UpstreamConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            connect_timeout: cfg.connect_timeout(),
            read_timeout: cfg.read_timeout(),
            max_headers: cfg.max_response_headers_bytes as usize,
            max_body: cfg.max_response_body_bytes as usize,
        }
    }
}

#[async_trait]
impl Fetch for TcpFetcher {
    #[instrument(skip_all)]
    async fn fetch(&self, raw_url: &str) -> Result<FetchedResponse, FetchError> {
        let parsed = Url::parse(raw_url).map_err(|e| FetchError::BadUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" {
            return Err(FetchError::BadUrl {
                url: raw_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let host = parsed.host_str().ok_or_else(|| FetchError::BadUrl {
            url: raw_url.to_string(),
            reason: "missing host".into(),
        })?;
        let port = parsed.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        debug!(target: "subgate::upstream", upstream = %addr, "Connecting to conversion service");

        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(FetchError::Connect { addr, source: e }),
            Err(_) => return Err(FetchError::Timeout),
        };

        let host_header = if port == 80 {
            host.to_string()
        } else {
            format!("{host}:{port}")
        };
        let mut target = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            target.push('?');
            target.push_str(query);
        }

        let request = format!(
            "GET {target} HTTP/1.1\r\n\
             Host: {host_header}\r\n\
             User-Agent: {}\r\n\
             Accept: */*\r\n\
             Accept-Encoding: identity\r\n\
             Connection: close\r\n\
             \r\n",
            self.user_agent
        );
        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;

        let raw = read_response(
            &mut stream,
            self.read_timeout,
            self.max_headers,
            self.max_body,
        )
        .await?;

        if raw.status != 200 {
            warn!(
                target: "subgate::upstream",
                upstream = %addr,
                status = raw.status,
                "Conversion service returned a non-200 status"
            );
            return Err(FetchError::BadStatus { status: raw.status });
        }

        Ok(FetchedResponse {
            status: raw.status,
            headers: raw.headers,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        })
    }
}
