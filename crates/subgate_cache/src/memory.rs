use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::entry::{CacheEntry, CachedResponse, now_nanos};
use crate::error::CacheError;
use crate::store::CacheStore;

/// Volatile backend: a reader/writer-locked map, expiry checked lazily on
/// read. Never returns an error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        {
            let entries = self.read_entries();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Lazy expiry upgrades the read into a write. The entry may have
        // been replaced between the two locks, so re-check before removing.
        let mut entries = self.write_entries();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                debug!(target: "subgate::cache", cache_key = %key, "Removed expired entry");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, ttl);
        self.write_entries().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.write_entries().remove(key);
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = now_nanos();
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}
