use subgate_config::GatewayConfig;
use url::Url;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ResolveError {
    /// `sub_type=mix` without a usable `mix_items` list.
    MissingMixItems,
    /// A requested subscription name has no configured mapping.
    UnknownSubscription(String),
    /// The configured conversion format string does not parse as a URL.
    InvalidConvertFmt(String),
}

/// Resolve the requested subscription type to its source URL. A `mix`
/// request concatenates the sub-URLs of each named component, in the order
/// listed, joined by `|`.
pub(crate) fn resolve_source(
    gateway: &GatewayConfig,
    sub_type: &str,
    mix_items: Option<&str>,
) -> Result<String, ResolveError> {
    if sub_type == "mix" {
        let items = mix_items.unwrap_or("");
        if items.is_empty() {
            return Err(ResolveError::MissingMixItems);
        }

        let mut urls = Vec::new();
        for name in items.split(',') {
            match gateway.subscription(name) {
                Some(sub_url) => urls.push(sub_url),
                None => return Err(ResolveError::UnknownSubscription(name.to_string())),
            }
        }
        return Ok(urls.join("|"));
    }

    gateway
        .subscription(sub_type)
        .map(str::to_string)
        .ok_or_else(|| ResolveError::UnknownSubscription(sub_type.to_string()))
}

/// Compose the outbound conversion URL from the configured format prefix,
/// the resolved source URL (percent-encoded), and the filename template.
/// The composed string doubles as the cache key.
pub(crate) fn compose_convert_url(
    gateway: &GatewayConfig,
    sub_type: &str,
    source_url: &str,
) -> Result<String, ResolveError> {
    let mut url = Url::parse(&gateway.convert_fmt)
        .map_err(|e| ResolveError::InvalidConvertFmt(e.to_string()))?;

    let filename = gateway.filename_fmt.replace("{sub_type}", sub_type);
    url.query_pairs_mut()
        .append_pair("url", source_url)
        .append_pair("filename", &filename);

    Ok(url.to_string())
}
