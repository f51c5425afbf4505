use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use crate::ClientStream;
use crate::responses::{send_400, send_408, send_431};

/// One parsed inbound request line. The gateway's surface carries
/// everything in the query string, so headers and bodies are read past but
/// never interpreted.
#[derive(Debug)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub http_version: String,
}

pub(crate) enum ReadOutcome {
    Read(usize),
    Timeout,
}

pub(crate) async fn read_more(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    timeout_dur: Duration,
) -> anyhow::Result<ReadOutcome> {
    let mut tmp = [0u8; 4096];
    match timeout(timeout_dur, stream.read(&mut tmp)).await {
        Ok(res) => {
            let n = res?;
            if n > 0 {
                buf.extend_from_slice(&tmp[..n]);
            }
            Ok(ReadOutcome::Read(n))
        }
        Err(_) => Ok(ReadOutcome::Timeout),
    }
}

/// Reads a full HTTP request head:
/// - Reads until `\r\n\r\n` (end of headers)
/// - Enforces the header-size cap (431) and the read timeout (408)
/// - Parses the request line
///
/// Error responses are written here; `Ok(None)` means the connection
/// should simply be closed.
pub async fn read_http_request(
    stream: &mut dyn ClientStream,
    read_timeout: Duration,
    max_headers: usize,
) -> anyhow::Result<Option<ParsedRequest>> {
    let mut buf = BytesMut::new();

    let headers_end = loop {
        if let Some(pos) = find_headers_end(&buf) {
            break pos;
        }

        if max_headers > 0 && buf.len() > max_headers {
            send_431(stream).await?;
            return Ok(None);
        }

        match read_more(stream, &mut buf, read_timeout).await? {
            ReadOutcome::Timeout => {
                if buf.is_empty() {
                    return Ok(None);
                }
                send_408(stream).await?;
                return Ok(None);
            }
            ReadOutcome::Read(0) => return Ok(None),
            ReadOutcome::Read(_) => {}
        }
    };

    let header_bytes = &buf[..headers_end];
    let headers_str = String::from_utf8_lossy(header_bytes).to_string();

    debug!(
        target: "subgate::http",
        header_len = headers_str.len(),
        "Parsed HTTP request head"
    );

    match parse_request_line(&headers_str) {
        Some(req) => Ok(Some(req)),
        None => {
            warn!(target: "subgate::http", "Malformed request line");
            send_400(stream).await?;
            Ok(None)
        }
    }
}

fn find_headers_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_request_line(headers: &str) -> Option<ParsedRequest> {
    let request_line = headers.lines().next()?;
    let mut parts = request_line.split_whitespace();

    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let http_version = parts.next().unwrap_or("HTTP/1.1").to_string();

    if method.is_empty() || !target.starts_with('/') {
        return None;
    }

    Some(ParsedRequest {
        method,
        target,
        http_version,
    })
}
