use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::store::CacheStore;

/// Spawn a background task that sweeps expired entries on a fixed
/// interval. The tick loop is sequential, so a sweep never overlaps
/// itself; each sweep takes the store's exclusive path once.
pub fn spawn_sweeper(store: Arc<dyn CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    debug!(target: "subgate::cache", removed, "Sweep removed expired entries");
                }
                Err(e) => {
                    warn!(target: "subgate::cache", error = ?e, "Sweep failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::spawn_sweeper;
    use crate::entry::CachedResponse;
    use crate::memory::MemoryStore;
    use crate::store::CacheStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn payload() -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: Vec::new(),
            body: "x".into(),
        }
    }

    #[tokio::test]
    async fn sweeper_reclaims_expired_entries_without_a_get() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("stale", payload(), Duration::from_millis(5))
            .await
            .expect("set");
        store
            .set("fresh", payload(), Duration::from_secs(60))
            .await
            .expect("set");

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert_eq!(store.len(), 1);
        assert!(store.get("fresh").await.expect("get").is_some());
    }
}
