use std::sync::Arc;

use subgate_cache::{CacheStore, FileStore, MemoryStore, spawn_sweeper};
use subgate_config::{CacheBackend, SubgateConfig};
use subgate_core::Server;
use subgate_upstream::TcpFetcher;
use tracing::{info, warn};
use utils::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cnf_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "subgate.yaml".to_string());
    let cfg = SubgateConfig::from_file_or_default(&cnf_path);

    let report = cfg.validate();
    if report.has_errors() {
        anyhow::bail!("invalid configuration in '{cnf_path}':\n{}", report.format());
    }
    for warning in report.warnings() {
        warn!(target: "subgate::config", %warning, "Config warning");
    }
    cfg.print();

    let cfg = Arc::new(cfg);

    let store: Arc<dyn CacheStore> = match cfg.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File => {
            let path = cfg.cache.file_path.as_deref().unwrap_or_default();
            Arc::new(FileStore::new(path))
        }
    };

    if let Some(interval) = cfg.cache.sweep_interval() {
        info!(
            target: "subgate::cache",
            interval_secs = interval.as_secs(),
            "Background sweep enabled"
        );
        let _sweeper = spawn_sweeper(store.clone(), interval);
    }

    let fetcher = Arc::new(TcpFetcher::from_config(&cfg.upstream));

    let server = Server::new(cfg, store, fetcher);
    server.run().await
}
