use std::time::Duration;

use async_trait::async_trait;

use crate::entry::CachedResponse;
use crate::error::CacheError;

/// Contract shared by every cache backend.
///
/// All operations are safe to call concurrently from any number of tasks.
/// `get` never returns an entry whose expiration has passed; the expired
/// entry is removed as a side effect of the lookup.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up `key`, honoring expiration. Expired entries are removed.
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError>;

    /// Insert or overwrite the entry for `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), CacheError>;

    /// Remove any entry for `key`; no-op if absent.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry already expired as of now. Returns how many
    /// entries were dropped. Used by the optional background sweep.
    async fn sweep_expired(&self) -> Result<usize, CacheError>;
}
