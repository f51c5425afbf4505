use std::net::SocketAddr;

use url::Url;

use crate::{CacheBackend, SubgateConfig};

/// Validation output for a loaded Subgate configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a Subgate configuration and return a report of issues.
pub fn validate(cfg: &SubgateConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_global(cfg, &mut report);
    validate_gateway(cfg, &mut report);
    validate_cache(cfg, &mut report);
    validate_upstream(cfg, &mut report);

    report
}

fn validate_global(cfg: &SubgateConfig, report: &mut ConfigReport) {
    if cfg.global.listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "global.listen '{}' is not a valid socket address",
            cfg.global.listen
        ));
    }

    if cfg.global.max_connections == 0 {
        report.error("global.max_connections is 0; the gateway could not accept any connection");
    }
}

fn validate_gateway(cfg: &SubgateConfig, report: &mut ConfigReport) {
    if cfg.gateway.token.is_empty() {
        report.error("gateway.token is empty; every request would be rejected");
    }

    if cfg.gateway.convert_fmt.is_empty() {
        report.error("gateway.convert_fmt is empty; no conversion URL can be composed");
    } else if let Err(e) = Url::parse(&cfg.gateway.convert_fmt) {
        report.error(format!(
            "gateway.convert_fmt '{}' is not a valid URL: {e}",
            cfg.gateway.convert_fmt
        ));
    }

    if cfg.gateway.subscriptions.is_empty() {
        report.error("gateway.subscriptions is empty; no sub_type can resolve");
    }

    for (name, sub_url) in &cfg.gateway.subscriptions {
        if Url::parse(sub_url).is_err() {
            report.warn(format!(
                "gateway.subscriptions.{name} '{sub_url}' does not look like a URL"
            ));
        }
    }

    if !cfg.gateway.filename_fmt.contains("{sub_type}") {
        report.warn("gateway.filename_fmt has no {sub_type} placeholder; all conversions share one filename");
    }
}

fn validate_cache(cfg: &SubgateConfig, report: &mut ConfigReport) {
    if cfg.cache.backend == CacheBackend::File
        && cfg.cache.file_path.as_deref().unwrap_or("").is_empty()
    {
        report.error("cache.backend is 'file' but cache.file_path is not set");
    }

    if cfg.cache.ttl_hours == 0 {
        report.warn("cache.ttl_hours is 0; every entry expires immediately");
    }
}

fn validate_upstream(cfg: &SubgateConfig, report: &mut ConfigReport) {
    if cfg.upstream.read_timeout_secs == 0 {
        report.warn("upstream.read_timeout_secs is 0; a stalled upstream would hang requests");
    }

    if cfg.upstream.max_response_body_bytes == 0 {
        report.warn("upstream.max_response_body_bytes is 0; every upstream body would be rejected");
    }
}
