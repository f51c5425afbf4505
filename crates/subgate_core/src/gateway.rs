use std::sync::Arc;

use tracing::{debug, error, info, warn};

use subgate_cache::{CacheStore, CachedResponse};
use subgate_config::SubgateConfig;
use subgate_http::QueryParams;
use subgate_upstream::Fetch;

use crate::headers::filter_response_headers;
use crate::resolve::{ResolveError, compose_convert_url, resolve_source};

/// What a `/convert` request produced. The worker maps each variant to a
/// status code; the upstream failure cause stays in the logs.
#[derive(Debug)]
pub enum GatewayOutcome {
    Success(CachedResponse),
    Unauthorized,
    BadRequest,
    NotFound,
    Unavailable,
}

/// The conversion gateway policy. Holds the configuration, the cache
/// store, and the upstream fetcher; one instance is shared by every
/// in-flight request.
pub struct Gateway {
    cfg: Arc<SubgateConfig>,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
}

impl Gateway {
    pub fn new(
        cfg: Arc<SubgateConfig>,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            cfg,
            store,
            fetcher,
        }
    }

    /// Run one request through the policy:
    /// authenticate → resolve → cache lookup → fetch on miss → store →
    /// outcome. Cache failures degrade to a miss; they never fail the
    /// request.
    pub async fn handle(&self, params: &QueryParams) -> GatewayOutcome {
        if params.get("token") != Some(self.cfg.gateway.token.as_str()) {
            warn!(target: "subgate::gateway", "Rejected request with bad token");
            return GatewayOutcome::Unauthorized;
        }

        let sub_type = params.get("sub_type").unwrap_or("");
        let source = match resolve_source(&self.cfg.gateway, sub_type, params.get("mix_items")) {
            Ok(source) => source,
            Err(ResolveError::MissingMixItems) => {
                warn!(target: "subgate::gateway", "Mix request without mix_items");
                return GatewayOutcome::BadRequest;
            }
            Err(ResolveError::UnknownSubscription(name)) => {
                warn!(
                    target: "subgate::gateway",
                    subscription = %name,
                    "Unknown subscription type"
                );
                return GatewayOutcome::NotFound;
            }
            Err(ResolveError::InvalidConvertFmt(reason)) => {
                error!(target: "subgate::gateway", %reason, "Bad convert_fmt");
                return GatewayOutcome::Unavailable;
            }
        };

        let convert_url = match compose_convert_url(&self.cfg.gateway, sub_type, &source) {
            Ok(url) => url,
            Err(ResolveError::InvalidConvertFmt(reason)) => {
                error!(target: "subgate::gateway", %reason, "Bad convert_fmt");
                return GatewayOutcome::Unavailable;
            }
            Err(_) => return GatewayOutcome::NotFound,
        };

        // The composed URL is the cache key. A persistence failure means
        // the cache is unavailable, not the gateway: treat it as a miss.
        match self.store.get(&convert_url).await {
            Ok(Some(hit)) => {
                debug!(target: "subgate::gateway", %sub_type, "Cache hit");
                return GatewayOutcome::Success(hit);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    target: "subgate::gateway",
                    error = ?e,
                    "Cache lookup failed; treating as miss"
                );
            }
        }

        info!(target: "subgate::gateway", %sub_type, "Cache miss; calling conversion service");
        let fetched = match self.fetcher.fetch(&convert_url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(target: "subgate::gateway", %sub_type, error = %e, "Upstream fetch failed");
                return GatewayOutcome::Unavailable;
            }
        };

        let response = CachedResponse {
            status: fetched.status,
            headers: filter_response_headers(fetched.headers),
            body: fetched.body,
        };

        if let Err(e) = self
            .store
            .set(&convert_url, response.clone(), self.cfg.cache.ttl())
            .await
        {
            warn!(target: "subgate::gateway", error = ?e, "Failed to store response in cache");
        }

        GatewayOutcome::Success(response)
    }
}

#[cfg(test)]
mod tests {
    use super::{Gateway, GatewayOutcome};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use subgate_cache::{CacheError, CacheStore, CachedResponse, MemoryStore};
    use subgate_config::SubgateConfig;
    use subgate_http::QueryParams;
    use subgate_upstream::{Fetch, FetchError, FetchedResponse};

    struct MockFetch {
        calls: AtomicUsize,
        fail_status: Option<u16>,
    }

    impl MockFetch {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_status: None,
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_status: Some(status),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetch for MockFetch {
        async fn fetch(&self, _url: &str) -> Result<FetchedResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_status {
                Some(status) => Err(FetchError::BadStatus { status }),
                None => Ok(FetchedResponse {
                    status: 200,
                    headers: vec![
                        ("Content-Type".into(), "text/yaml".into()),
                        ("Content-Encoding".into(), "gzip".into()),
                        ("Vary".into(), "Accept-Encoding".into()),
                    ],
                    body: "proxies: []".into(),
                }),
            }
        }
    }

    /// A store whose persistence is permanently broken.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedResponse>, CacheError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn set(
            &self,
            _key: &str,
            _value: CachedResponse,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn sweep_expired(&self) -> Result<usize, CacheError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    fn config() -> Arc<SubgateConfig> {
        let mut cfg = SubgateConfig::default();
        cfg.gateway.token = "s3cret".into();
        cfg.gateway.convert_fmt = "http://127.0.0.1:25500/sub?target=clash".into();
        cfg.gateway.subscriptions.insert("a".into(), "http://x/a".into());
        cfg.gateway.subscriptions.insert("b".into(), "http://x/b".into());
        Arc::new(cfg)
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(pairs.iter().copied())
    }

    fn gateway_with(
        fetcher: Arc<MockFetch>,
        store: Arc<MemoryStore>,
    ) -> Gateway {
        Gateway::new(config(), store, fetcher)
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_touches_nothing() {
        let fetcher = Arc::new(MockFetch::ok());
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway_with(fetcher.clone(), store.clone());

        let outcome = gateway
            .handle(&params(&[("token", "wrong"), ("sub_type", "a")]))
            .await;

        assert!(matches!(outcome, GatewayOutcome::Unauthorized));
        assert_eq!(fetcher.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let gateway = gateway_with(Arc::new(MockFetch::ok()), Arc::new(MemoryStore::new()));
        let outcome = gateway.handle(&params(&[("sub_type", "a")])).await;
        assert!(matches!(outcome, GatewayOutcome::Unauthorized));
    }

    #[tokio::test]
    async fn mix_without_items_is_bad_request() {
        let gateway = gateway_with(Arc::new(MockFetch::ok()), Arc::new(MemoryStore::new()));
        let outcome = gateway
            .handle(&params(&[("token", "s3cret"), ("sub_type", "mix")]))
            .await;
        assert!(matches!(outcome, GatewayOutcome::BadRequest));
    }

    #[tokio::test]
    async fn unknown_sub_type_is_not_found() {
        let fetcher = Arc::new(MockFetch::ok());
        let gateway = gateway_with(fetcher.clone(), Arc::new(MemoryStore::new()));
        let outcome = gateway
            .handle(&params(&[("token", "s3cret"), ("sub_type", "nope")]))
            .await;
        assert!(matches!(outcome, GatewayOutcome::NotFound));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn success_is_served_and_cached() {
        let fetcher = Arc::new(MockFetch::ok());
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway_with(fetcher.clone(), store.clone());
        let request = params(&[("token", "s3cret"), ("sub_type", "a")]);

        let first = gateway.handle(&request).await;
        let GatewayOutcome::Success(response) = first else {
            panic!("expected success, got {first:?}");
        };
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "proxies: []");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.len(), 1);

        // Second identical request replays the cache without a fetch.
        let second = gateway.handle(&request).await;
        assert!(matches!(second, GatewayOutcome::Success(_)));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn denylisted_headers_never_reach_the_response() {
        let gateway = gateway_with(Arc::new(MockFetch::ok()), Arc::new(MemoryStore::new()));
        let outcome = gateway
            .handle(&params(&[("token", "s3cret"), ("sub_type", "a")]))
            .await;

        let GatewayOutcome::Success(response) = outcome else {
            panic!("expected success");
        };
        assert_eq!(
            response.headers,
            vec![("Content-Type".to_string(), "text/yaml".to_string())]
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_unavailable_and_poisons_nothing() {
        let fetcher = Arc::new(MockFetch::failing(500));
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway_with(fetcher.clone(), store.clone());
        let request = params(&[("token", "s3cret"), ("sub_type", "a")]);

        let outcome = gateway.handle(&request).await;
        assert!(matches!(outcome, GatewayOutcome::Unavailable));
        assert!(store.is_empty());

        // Nothing was cached, so the next identical request fetches again.
        let outcome = gateway.handle(&request).await;
        assert!(matches!(outcome, GatewayOutcome::Unavailable));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn mix_requests_share_a_key_regardless_of_inbound_extras() {
        let fetcher = Arc::new(MockFetch::ok());
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway_with(fetcher.clone(), store.clone());

        let first = params(&[
            ("token", "s3cret"),
            ("sub_type", "mix"),
            ("mix_items", "a,b"),
        ]);
        let second = params(&[
            ("sub_type", "mix"),
            ("mix_items", "a,b"),
            ("token", "s3cret"),
        ]);

        gateway.handle(&first).await;
        gateway.handle(&second).await;
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_fetching_every_time() {
        let fetcher = Arc::new(MockFetch::ok());
        let gateway = Gateway::new(config(), Arc::new(BrokenStore), fetcher.clone());
        let request = params(&[("token", "s3cret"), ("sub_type", "a")]);

        let outcome = gateway.handle(&request).await;
        assert!(matches!(outcome, GatewayOutcome::Success(_)));
        let outcome = gateway.handle(&request).await;
        assert!(matches!(outcome, GatewayOutcome::Success(_)));
        assert_eq!(fetcher.calls(), 2);
    }
}
