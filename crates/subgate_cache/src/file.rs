use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::{CacheEntry, CachedResponse, now_nanos};
use crate::error::CacheError;
use crate::store::CacheStore;

/// Durable backend: the whole mapping lives in one JSON file.
///
/// Every operation, reads included, reloads the mapping from disk, so a
/// different store instance (or process) pointed at the same file observes
/// mutations. One mutex serializes all operations; there is no
/// concurrent-read optimization. The file handle never outlives a single
/// operation.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full mapping. A missing file is an empty mapping; corrupt
    /// JSON is reported to the caller.
    async fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Rewrite the full mapping atomically: serialize to a temporary
    /// sibling, fsync, rename over the target. A reader in another process
    /// sees either the old file or the new one, never a partial write.
    async fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let serialized = serde_json::to_vec(entries)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load().await?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        if entry.is_expired() {
            // Rewrite with the entry removed so later calls stop reloading it.
            entries.remove(key);
            self.save(&entries).await?;
            debug!(target: "subgate::cache", cache_key = %key, "Removed expired entry from cache file");
            return Ok(None);
        }

        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load().await?;
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.save(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.load().await?;
        entries.remove(key);
        self.save(&entries).await
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let _guard = self.lock.lock().await;

        let now = now_nanos();
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.save(&entries).await?;
        }
        Ok(removed)
    }
}
