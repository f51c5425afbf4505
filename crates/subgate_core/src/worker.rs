use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use subgate_config::SubgateConfig;
use subgate_http::responses::{
    send_400, send_401, send_404, send_405, send_503, write_relayed_response,
};
use subgate_http::{ClientStream, parse_target, read_http_request};

use crate::gateway::{Gateway, GatewayOutcome};

/// Handles a single client connection: read one request, run it through
/// the gateway policy, write the response, close.
#[instrument(skip(stream, gateway, cfg), fields(client = %client_addr))]
pub async fn handle_connection(
    mut stream: Box<dyn ClientStream>,
    client_addr: SocketAddr,
    gateway: Arc<Gateway>,
    cfg: Arc<SubgateConfig>,
) -> anyhow::Result<()> {
    debug!(target: "subgate::worker", "Handling new client connection");

    let req = match read_http_request(
        stream.as_mut(),
        cfg.global.client_read_timeout(),
        cfg.global.max_request_headers_bytes as usize,
    )
    .await?
    {
        Some(req) => req,
        None => return Ok(()),
    };

    debug!(
        target: "subgate::worker",
        method = %req.method,
        request_target = %req.target,
        "Parsed HTTP request line"
    );

    if req.method != "GET" {
        warn!(target: "subgate::worker", method = %req.method, "Unsupported method");
        return send_405(stream.as_mut()).await;
    }

    let Some((path, params)) = parse_target(&req.target) else {
        warn!(target: "subgate::worker", "Unparsable request target");
        return send_400(stream.as_mut()).await;
    };

    if path != "/convert" {
        return send_404(stream.as_mut()).await;
    }

    match gateway.handle(&params).await {
        GatewayOutcome::Success(response) => {
            write_relayed_response(
                stream.as_mut(),
                response.status,
                &response.headers,
                &response.body,
            )
            .await
        }
        GatewayOutcome::Unauthorized => send_401(stream.as_mut()).await,
        GatewayOutcome::BadRequest => send_400(stream.as_mut()).await,
        GatewayOutcome::NotFound => send_404(stream.as_mut()).await,
        GatewayOutcome::Unavailable => send_503(stream.as_mut()).await,
    }
}
