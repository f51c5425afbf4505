use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

mod subgate;
mod validation;

pub use subgate::SubgateConfig;
pub use validation::{ConfigReport, validate};

// =======================================================
// GLOBAL CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub listen: String,
    pub log_level: String,
    pub max_connections: u16,

    // Inbound limits (seconds / bytes)
    pub client_read_timeout_secs: u64,
    pub max_request_headers_bytes: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8008".into(),
            log_level: "info".into(),
            max_connections: 1024,
            client_read_timeout_secs: 15,
            max_request_headers_bytes: 16 * 1024,
        }
    }
}

impl GlobalConfig {
    pub fn client_read_timeout(&self) -> Duration {
        Duration::from_secs(self.client_read_timeout_secs)
    }
}

// =======================================================
// GATEWAY CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared secret checked against the `token` query parameter.
    pub token: String,
    /// Conversion-service URL prefix, including its own query string.
    pub convert_fmt: String,
    /// Filename template appended to the conversion URL; `{sub_type}` is
    /// replaced with the requested subscription type.
    pub filename_fmt: String,
    /// Logical subscription name -> source URL.
    pub subscriptions: HashMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            convert_fmt: String::new(),
            filename_fmt: "Clash_{sub_type}.yaml".into(),
            subscriptions: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn subscription(&self, name: &str) -> Option<&str> {
        self.subscriptions.get(name).map(String::as_str)
    }
}

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    File,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Backing file for the `file` backend.
    pub file_path: Option<String>,
    pub ttl_hours: u64,
    /// Background sweep interval; 0 or absent disables the sweep.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            file_path: None,
            ttl_hours: 22,
            sweep_interval_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

// =======================================================
// UPSTREAM CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub user_agent: String,

    // Timeouts (seconds)
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,

    // Limits (bytes)
    pub max_response_headers_bytes: u64,
    pub max_response_body_bytes: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: "ClashforWindows/0.19.23".into(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            max_response_headers_bytes: 64 * 1024,
            max_response_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
