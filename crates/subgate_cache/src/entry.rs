use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Response payload stored for replay: status code, selected headers, body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A cached value plus its absolute expiration instant, kept as integer
/// nanoseconds since the Unix epoch so both backends share one wire format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CachedResponse,
    pub expires_at_nanos: i128,
}

impl CacheEntry {
    pub fn new(value: CachedResponse, ttl: Duration) -> Self {
        Self {
            value,
            expires_at_nanos: now_nanos().saturating_add(ttl.as_nanos() as i128),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_nanos())
    }

    pub fn is_expired_at(&self, now: i128) -> bool {
        now > self.expires_at_nanos
    }
}

/// Nanoseconds since the Unix epoch.
pub(crate) fn now_nanos() -> i128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}
