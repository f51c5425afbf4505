use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{Duration, timeout};

use crate::FetchError;

/// A fully buffered upstream response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

/// Reads one HTTP response:
/// 1) Reads until `\r\n\r\n` (end of headers), capped at `max_headers`
/// 2) Parses the status line and the header block
/// 3) Reads the body by Content-Length, chunked de-framing, or to EOF,
///    capped at `max_body`
///
/// Every socket read is wrapped in `read_timeout`.
pub(crate) async fn read_response<R>(
    stream: &mut R,
    read_timeout: Duration,
    max_headers: usize,
    max_body: usize,
) -> Result<RawResponse, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = BytesMut::new();

    let headers_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }

        if max_headers > 0 && buf.len() > max_headers {
            return Err(FetchError::Http("response headers too large".into()));
        }

        if read_more(stream, &mut buf, read_timeout).await? == 0 {
            return Err(FetchError::Http(
                "connection closed while reading headers".into(),
            ));
        }
    };

    let header_str = String::from_utf8_lossy(&buf[..headers_end]).to_string();
    buf.advance(headers_end + 4);

    let (status, headers) = parse_head(&header_str)?;
    let content_length = find_content_length(&headers)?;
    let is_chunked = has_chunked_encoding(&headers);

    let body = if is_chunked {
        decode_chunked(stream, &mut buf, read_timeout, max_body).await?
    } else if let Some(len) = content_length {
        if max_body > 0 && len > max_body {
            return Err(FetchError::TooLarge { limit: max_body });
        }
        read_exact_body(stream, &mut buf, len, read_timeout).await?
    } else {
        read_to_eof(stream, &mut buf, read_timeout, max_body).await?
    };

    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Parse the status line and header block into (status, ordered headers).
fn parse_head(header_str: &str) -> Result<(u16, Vec<(String, String)>), FetchError> {
    let mut lines = header_str.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| FetchError::Http("empty response head".into()))?;
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(FetchError::Http(format!("bad status line '{status_line}'")));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| FetchError::Http(format!("bad status line '{status_line}'")))?;

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok((status, headers))
}

fn find_content_length(headers: &[(String, String)]) -> Result<Option<usize>, FetchError> {
    let mut found: Option<usize> = None;
    for (name, value) in headers {
        if !name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        let len = value
            .trim()
            .parse::<usize>()
            .map_err(|_| FetchError::Http(format!("invalid content-length '{value}'")))?;
        if let Some(prev) = found {
            if prev != len {
                return Err(FetchError::Http("conflicting content-length".into()));
            }
        }
        found = Some(len);
    }
    Ok(found)
}

fn has_chunked_encoding(headers: &[(String, String)]) -> bool {
    headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("transfer-encoding")
            && value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
    })
}

async fn read_exact_body<R>(
    stream: &mut R,
    buf: &mut BytesMut,
    len: usize,
    read_timeout: Duration,
) -> Result<Vec<u8>, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    while buf.len() < len {
        if read_more(stream, buf, read_timeout).await? == 0 {
            return Err(FetchError::Http(
                "connection closed before body completed".into(),
            ));
        }
    }
    let body = buf.split_to(len);
    Ok(body.to_vec())
}

async fn read_to_eof<R>(
    stream: &mut R,
    buf: &mut BytesMut,
    read_timeout: Duration,
    max_body: usize,
) -> Result<Vec<u8>, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        if max_body > 0 && buf.len() > max_body {
            return Err(FetchError::TooLarge { limit: max_body });
        }
        if read_more(stream, buf, read_timeout).await? == 0 {
            return Ok(buf.split().to_vec());
        }
    }
}

/// De-frame a chunked body: hex size line, data, CRLF, repeated; a zero
/// chunk ends the body, followed by optional trailers and a bare CRLF.
async fn decode_chunked<R>(
    stream: &mut R,
    buf: &mut BytesMut,
    read_timeout: Duration,
    max_body: usize,
) -> Result<Vec<u8>, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut body = Vec::new();

    loop {
        let line = read_line(stream, buf, read_timeout).await?;
        let size_str = std::str::from_utf8(&line[..line.len() - 2])
            .map_err(|_| FetchError::Http("invalid chunk size line".into()))?
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| FetchError::Http(format!("invalid chunk size '{size_str}'")))?;

        if chunk_size == 0 {
            loop {
                let trailer = read_line(stream, buf, read_timeout).await?;
                if trailer == b"\r\n" {
                    return Ok(body);
                }
            }
        }

        if max_body > 0 && body.len().saturating_add(chunk_size) > max_body {
            return Err(FetchError::TooLarge { limit: max_body });
        }

        while buf.len() < chunk_size + 2 {
            if read_more(stream, buf, read_timeout).await? == 0 {
                return Err(FetchError::Http(
                    "connection closed inside chunked body".into(),
                ));
            }
        }
        body.extend_from_slice(&buf[..chunk_size]);
        buf.advance(chunk_size + 2);
    }
}

async fn read_line<R>(
    stream: &mut R,
    buf: &mut BytesMut,
    read_timeout: Duration,
) -> Result<Vec<u8>, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let line = buf.split_to(pos + 2);
            return Ok(line.to_vec());
        }
        if read_more(stream, buf, read_timeout).await? == 0 {
            return Err(FetchError::Http(
                "connection closed while reading chunk framing".into(),
            ));
        }
    }
}

async fn read_more<R>(
    stream: &mut R,
    buf: &mut BytesMut,
    read_timeout: Duration,
) -> Result<usize, FetchError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut tmp = [0u8; 4096];
    match timeout(read_timeout, stream.read(&mut tmp)).await {
        Ok(res) => {
            let n = res?;
            if n > 0 {
                buf.extend_from_slice(&tmp[..n]);
            }
            Ok(n)
        }
        Err(_) => Err(FetchError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::read_response;
    use crate::FetchError;
    use std::io::Cursor;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    async fn read(raw: &[u8]) -> Result<super::RawResponse, FetchError> {
        let mut stream = Cursor::new(raw.to_vec());
        read_response(&mut stream, TIMEOUT, 16 * 1024, 1024 * 1024).await
    }

    #[tokio::test]
    async fn parses_content_length_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/yaml\r\nContent-Length: 11\r\n\r\nproxies: []";
        let res = read(raw).await.expect("expected ok");
        assert_eq!(res.status, 200);
        assert_eq!(res.body, b"proxies: []");
        assert_eq!(
            res.headers,
            vec![
                ("Content-Type".to_string(), "text/yaml".to_string()),
                ("Content-Length".to_string(), "11".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn reads_to_eof_without_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello";
        let res = read(raw).await.expect("expected ok");
        assert_eq!(res.body, b"hello");
    }

    #[tokio::test]
    async fn decodes_chunked_body() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\nprox\r\n7\r\nies: []\r\n0\r\n\r\n";
        let res = read(raw).await.expect("expected ok");
        assert_eq!(res.body, b"proxies: []");
    }

    #[tokio::test]
    async fn chunked_trailers_are_consumed() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    5\r\nhello\r\n0\r\nX-Trailer: t\r\n\r\n";
        let res = read(raw).await.expect("expected ok");
        assert_eq!(res.body, b"hello");
    }

    #[tokio::test]
    async fn non_200_status_is_parsed_not_rejected_here() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let res = read(raw).await.expect("expected ok");
        assert_eq!(res.status, 404);
        assert!(res.body.is_empty());
    }

    #[tokio::test]
    async fn conflicting_content_length_is_an_error() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\nhello";
        let err = read(raw).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[tokio::test]
    async fn garbage_status_line_is_an_error() {
        let raw = b"NOPE\r\n\r\n";
        let err = read(raw).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[tokio::test]
    async fn body_over_cap_is_too_large() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n";
        let mut stream = Cursor::new(raw.to_vec());
        let err = read_response(&mut stream, TIMEOUT, 16 * 1024, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 10 }));
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\nshort";
        let err = read(raw).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }
}
