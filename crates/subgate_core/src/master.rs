use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use subgate_cache::CacheStore;
use subgate_config::SubgateConfig;
use subgate_upstream::Fetch;

use crate::gateway::Gateway;
use crate::worker::handle_connection;

/// The listening side of the gateway: binds the socket and spawns one
/// worker task per accepted connection, bounded by a global semaphore.
pub struct Server {
    cfg: Arc<SubgateConfig>,
    gateway: Arc<Gateway>,
}

impl Server {
    pub fn new(
        cfg: Arc<SubgateConfig>,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let gateway = Arc::new(Gateway::new(cfg.clone(), store, fetcher));
        Self { cfg, gateway }
    }

    /// Starts the server: binds the listener and runs the accept loop.
    #[instrument(skip(self), fields(listen = %self.cfg.global.listen))]
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "subgate::master", "Starting subgate");

        // Global limit for concurrent connections across the process.
        let max_conns = self.cfg.global.max_connections as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));

        info!(
            target: "subgate::master",
            max_conns,
            "Connection semaphore initialized"
        );

        let listener = match TcpListener::bind(&self.cfg.global.listen).await {
            Ok(listener) => {
                info!(
                    target: "subgate::master",
                    listen = %self.cfg.global.listen,
                    "Bind() successful"
                );
                listener
            }
            Err(e) => {
                error!(
                    target: "subgate::master",
                    listen = %self.cfg.global.listen,
                    error = ?e,
                    "Failed to bind listener"
                );
                return Err(e.into());
            }
        };

        loop {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // acquire_owned only fails once the semaphore is closed.
                Err(_) => break,
            };

            let (stream, client_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(target: "subgate::master", error = ?e, "Accept failed");
                    continue;
                }
            };

            debug!(
                target: "subgate::master",
                client = %client_addr,
                "Accepted connection"
            );

            let gateway = self.gateway.clone();
            let cfg = self.cfg.clone();
            tokio::spawn(async move {
                let result =
                    handle_connection(Box::new(stream), client_addr, gateway, cfg).await;
                if let Err(e) = result {
                    warn!(
                        target: "subgate::worker",
                        client = %client_addr,
                        error = ?e,
                        "Connection handler failed"
                    );
                }
                drop(permit);
            });
        }

        Ok(())
    }
}
