use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{CacheConfig, GatewayConfig, GlobalConfig, UpstreamConfig};

// =======================================================
// SUBGATE CONFIG -- main config
// =======================================================
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SubgateConfig {
    pub global: GlobalConfig,
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
}

impl SubgateConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Yaml).required(false))
            .add_source(config::Environment::with_prefix("SUBGATE").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("⚠️  Error reading config '{file_name}': {e}");
                eprintln!("➡️  Using default config (in-memory)...");
                SubgateConfig::default()
            }
        }
    }

    pub fn print(&self) {
        println!("================ SUBGATE CONFIG ================");

        println!("\n[global]");
        println!("  listen               = {}", self.global.listen);
        println!("  log_level            = {}", self.global.log_level);
        println!("  max_connections      = {}", self.global.max_connections);
        println!(
            "  client_read_timeout_secs = {}",
            self.global.client_read_timeout_secs
        );
        println!(
            "  max_request_headers_bytes = {}",
            self.global.max_request_headers_bytes
        );

        println!("\n[gateway]");
        println!("  token                = {}", mask(&self.gateway.token));
        println!("  convert_fmt          = {}", self.gateway.convert_fmt);
        println!("  filename_fmt         = {}", self.gateway.filename_fmt);
        println!("  subscriptions        = {} configured", self.gateway.subscriptions.len());
        for name in self.gateway.subscriptions.keys() {
            println!("    - {name}");
        }

        println!("\n[cache]");
        println!("  backend              = {:?}", self.cache.backend);
        println!("  file_path            = {:?}", self.cache.file_path);
        println!("  ttl_hours            = {}", self.cache.ttl_hours);
        println!(
            "  sweep_interval_secs  = {:?}",
            self.cache.sweep_interval_secs
        );

        println!("\n[upstream]");
        println!("  user_agent           = {}", self.upstream.user_agent);
        println!(
            "  connect_timeout_secs = {}",
            self.upstream.connect_timeout_secs
        );
        println!(
            "  read_timeout_secs    = {}",
            self.upstream.read_timeout_secs
        );
        println!(
            "  max_response_headers_bytes = {}",
            self.upstream.max_response_headers_bytes
        );
        println!(
            "  max_response_body_bytes = {}",
            self.upstream.max_response_body_bytes
        );

        println!("================================================");
    }
}

/// Never echo the shared secret into logs or stdout.
fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "<unset>".to_string()
    } else {
        format!("<set, {} chars>", secret.len())
    }
}

#[cfg(test)]
mod tests {
    use super::SubgateConfig;
    use crate::CacheBackend;
    use std::io::Write;

    #[test]
    fn from_file_parses_yaml_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("subgate.yaml");
        let mut file = std::fs::File::create(&path).expect("create config");
        write!(
            file,
            "global:\n  listen: \"127.0.0.1:9900\"\n\
             gateway:\n  token: \"s3cret\"\n  convert_fmt: \"http://127.0.0.1:25500/sub?target=clash\"\n  subscriptions:\n    main: \"http://example.com/sub\"\n\
             cache:\n  backend: file\n  file_path: \"/tmp/subgate-cache.json\"\n  ttl_hours: 6\n"
        )
        .expect("write config");

        let cfg = SubgateConfig::from_file(path.to_str().expect("utf8 path")).expect("parse");
        assert_eq!(cfg.global.listen, "127.0.0.1:9900");
        assert_eq!(cfg.gateway.token, "s3cret");
        assert_eq!(cfg.cache.backend, CacheBackend::File);
        assert_eq!(cfg.cache.ttl_hours, 6);
        assert_eq!(
            cfg.gateway.subscription("main"),
            Some("http://example.com/sub")
        );
        // Untouched sections fall back to defaults.
        assert_eq!(cfg.upstream.user_agent, "ClashforWindows/0.19.23");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = SubgateConfig::from_file("does-not-exist.yaml").expect("defaults");
        assert_eq!(cfg.global.listen, "0.0.0.0:8008");
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
        assert_eq!(cfg.cache.ttl_hours, 22);
        assert!(cfg.gateway.token.is_empty());
    }
}
