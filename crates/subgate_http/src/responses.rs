use tokio::io::AsyncWriteExt;

use crate::ClientStream;

/// Helper for sending a self-originated HTTP response with a binary body.
pub async fn send_response(
    stream: &mut dyn ClientStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> anyhow::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Server: subgate/0.1.0\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );

    stream.write_all(response.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

/// Helper for plain-text responses.
async fn send_text_response(
    stream: &mut dyn ClientStream,
    status: &str,
    body: &str,
) -> anyhow::Result<()> {
    send_response(stream, status, "text/plain; charset=utf-8", body.as_bytes()).await
}

pub async fn send_400(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "400 Bad Request", "400 Bad Request\n").await
}

pub async fn send_401(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "401 Unauthorized", "401 Unauthorized\n").await
}

pub async fn send_404(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "404 Not Found", "404 Not Found\n").await
}

pub async fn send_405(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "405 Method Not Allowed", "405 Method Not Allowed\n").await
}

pub async fn send_408(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(stream, "408 Request Timeout", "408 Request Timeout\n").await
}

pub async fn send_431(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(
        stream,
        "431 Request Header Fields Too Large",
        "431 Request Header Fields Too Large\n",
    )
    .await
}

pub async fn send_503(stream: &mut dyn ClientStream) -> anyhow::Result<()> {
    send_text_response(
        stream,
        "503 Service Unavailable",
        "503 Service Unavailable\n",
    )
    .await
}

/// Replay a cached or freshly fetched upstream response: its status code,
/// the already-filtered headers, then the body verbatim. Framing headers
/// are always ours.
pub async fn write_relayed_response(
    stream: &mut dyn ClientStream,
    status: u16,
    headers: &[(String, String)],
    body: &str,
) -> anyhow::Result<()> {
    let mut head = format!("HTTP/1.1 {status} {}\r\n", status_text(status));
    for (name, value) in headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
