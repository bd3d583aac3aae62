//! Strategy dispatch: one caching strategy per request class.
//!
//! Each strategy is a straight sequence of awaited steps ending in a
//! tagged [`StrategyOutcome`]. A failed live fetch is never retried; it
//! turns into the class fallback at once. No path returns an error.

use crate::classifier::RequestClass;
use enchat_cache::{CacheHit, CacheStoreManager, PartitionSet};
use enchat_core::ports::Fetcher;
use enchat_core::{GatewayConfig, GatewayRequest, GatewayResponse};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Live fetch only; never cached.
    NetworkOnly,
    /// Cache (dynamic, then static), else live fetch.
    CacheFirst,
    /// Cache-first; an offline navigation gets the cached offline document.
    CacheFirstWithOfflineDocument,
    /// Live fetch, else any cached copy.
    NetworkFirst,
}

impl Strategy {
    /// The fixed class-to-strategy mapping.
    pub fn for_class(class: RequestClass) -> Self {
        match class {
            RequestClass::Api => Strategy::NetworkOnly,
            RequestClass::Static => Strategy::CacheFirst,
            RequestClass::Navigational => Strategy::CacheFirstWithOfflineDocument,
            RequestClass::Default => Strategy::NetworkFirst,
        }
    }
}

/// Result of running a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Live response, returned as received.
    Network(GatewayResponse),
    /// Served from a partition.
    Cache {
        partition: String,
        response: GatewayResponse,
    },
    /// Synthesized after the network failed and the cache had nothing.
    Fallback(GatewayResponse),
}

impl StrategyOutcome {
    pub fn response(&self) -> &GatewayResponse {
        match self {
            StrategyOutcome::Network(response)
            | StrategyOutcome::Cache { response, .. }
            | StrategyOutcome::Fallback(response) => response,
        }
    }

    pub fn into_response(self) -> GatewayResponse {
        match self {
            StrategyOutcome::Network(response)
            | StrategyOutcome::Cache { response, .. }
            | StrategyOutcome::Fallback(response) => response,
        }
    }

    /// `network`, `cache` or `fallback`.
    pub fn source(&self) -> &'static str {
        match self {
            StrategyOutcome::Network(_) => "network",
            StrategyOutcome::Cache { .. } => "cache",
            StrategyOutcome::Fallback(_) => "fallback",
        }
    }

    fn from_hit(hit: CacheHit) -> Self {
        StrategyOutcome::Cache {
            partition: hit.partition,
            response: hit.response,
        }
    }
}

/// Response synthesized when a class has nothing better to offer.
pub fn synthesized_fallback(class: RequestClass) -> GatewayResponse {
    match class {
        RequestClass::Api => GatewayResponse::json(
            503,
            &serde_json::json!({ "error": "Network error, please try again" }),
        ),
        RequestClass::Static => GatewayResponse::text(404, "File not found"),
        RequestClass::Navigational => GatewayResponse::text(404, "Page not found"),
        RequestClass::Default => GatewayResponse::text(404, "Resource not found"),
    }
}

/// Tracks best-effort cache writes running behind responses.
///
/// Every write runs behind a shared gate; [`WriteBehind::pause`] closes it
/// so partitions can be evicted without a write landing halfway through.
#[derive(Clone, Default)]
pub struct WriteBehind {
    tasks: Arc<Mutex<JoinSet<()>>>,
    gate: Arc<RwLock<()>>,
}

impl WriteBehind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let gate = self.gate.clone();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _open = gate.read_owned().await;
            task.await;
        });
    }

    /// Hold back writes until the guard drops. Writes already running
    /// finish first.
    pub async fn pause(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    /// Wait for every write spawned so far.
    pub async fn flush(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Cache write task failed");
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Runs strategies for one gateway version.
pub struct StrategyDispatcher {
    partitions: PartitionSet,
    offline_document: String,
    store: CacheStoreManager,
    fetcher: Arc<dyn Fetcher>,
    writes: WriteBehind,
    retired: Arc<AtomicBool>,
}

impl StrategyDispatcher {
    pub fn new(
        config: &GatewayConfig,
        store: CacheStoreManager,
        fetcher: Arc<dyn Fetcher>,
        writes: WriteBehind,
    ) -> Self {
        Self {
            partitions: PartitionSet::for_config(config),
            offline_document: config.offline_document.clone(),
            store,
            fetcher,
            writes,
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    /// Stop writing to this version's partitions. Requests still in
    /// flight are answered but no longer stored.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Undo [`StrategyDispatcher::retire`].
    pub fn reinstate(&self) {
        self.retired.store(false, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub async fn dispatch(&self, class: RequestClass, request: &GatewayRequest) -> StrategyOutcome {
        let strategy = Strategy::for_class(class);
        debug!(class = %class, ?strategy, url = %request.url, "Dispatching request");

        match strategy {
            Strategy::NetworkOnly => self.network_only(class, request).await,
            Strategy::CacheFirst => self.cache_first(class, request, false).await,
            Strategy::CacheFirstWithOfflineDocument => self.cache_first(class, request, true).await,
            Strategy::NetworkFirst => self.network_first(class, request).await,
        }
    }

    async fn network_only(&self, class: RequestClass, request: &GatewayRequest) -> StrategyOutcome {
        match self.fetcher.fetch(request).await {
            Ok(response) => StrategyOutcome::Network(response),
            Err(e) => {
                warn!(url = %request.url, error = %e, "API request failed");
                StrategyOutcome::Fallback(synthesized_fallback(class))
            }
        }
    }

    async fn cache_first(
        &self,
        class: RequestClass,
        request: &GatewayRequest,
        offline_document: bool,
    ) -> StrategyOutcome {
        if let Some(hit) = self.lookup(request).await {
            return StrategyOutcome::from_hit(hit);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_behind(request, &response);
                StrategyOutcome::Network(response)
            }
            Err(e) => {
                warn!(class = %class, url = %request.url, error = %e, "Live fetch failed");
                if offline_document && let Some(hit) = self.lookup_offline_document(request).await {
                    return StrategyOutcome::from_hit(hit);
                }
                StrategyOutcome::Fallback(synthesized_fallback(class))
            }
        }
    }

    async fn network_first(&self, class: RequestClass, request: &GatewayRequest) -> StrategyOutcome {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_behind(request, &response);
                StrategyOutcome::Network(response)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Live fetch failed, trying cache");
                match self.lookup(request).await {
                    Some(hit) => StrategyOutcome::from_hit(hit),
                    None => StrategyOutcome::Fallback(synthesized_fallback(class)),
                }
            }
        }
    }

    /// Dynamic then static lookup. Read errors count as a miss.
    async fn lookup(&self, request: &GatewayRequest) -> Option<CacheHit> {
        match self.store.match_in(&self.partitions.lookup_order(), request).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    async fn lookup_offline_document(&self, request: &GatewayRequest) -> Option<CacheHit> {
        let document = match GatewayRequest::get_path(&request.url, &self.offline_document) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Invalid offline document path");
                return None;
            }
        };
        self.lookup(&document).await
    }

    /// Store a clone of an ok live response in the dynamic partition
    /// without holding up the caller.
    fn store_behind(&self, request: &GatewayRequest, response: &GatewayResponse) {
        if !response.is_ok() || self.is_retired() {
            return;
        }

        let store = self.store.clone();
        let partition = self.partitions.dynamic_name.clone();
        let retired = self.retired.clone();
        let request = request.clone();
        let snapshot = response.clone();
        self.writes.spawn(async move {
            if retired.load(Ordering::SeqCst) {
                debug!(partition = %partition, url = %request.url, "Skipping write for retired version");
                return;
            }
            if let Err(e) = store.put(&partition, &request, &snapshot).await {
                warn!(partition = %partition, url = %request.url, error = %e, "Cache write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockFetcher, get, html, test_config};
    use enchat_cache::{CacheStoreManager, MemoryStorage};

    struct Fixture {
        store: CacheStoreManager,
        fetcher: Arc<MockFetcher>,
        writes: WriteBehind,
        dispatcher: StrategyDispatcher,
    }

    fn fixture_with(store: CacheStoreManager, fetcher: MockFetcher) -> Fixture {
        let fetcher = Arc::new(fetcher);
        let writes = WriteBehind::new();
        let dispatcher =
            StrategyDispatcher::new(&test_config("v1"), store.clone(), fetcher.clone(), writes.clone());
        Fixture {
            store,
            fetcher,
            writes,
            dispatcher,
        }
    }

    fn fixture(fetcher: MockFetcher) -> Fixture {
        fixture_with(CacheStoreManager::new(Arc::new(MemoryStorage::new())), fetcher)
    }

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(Strategy::for_class(RequestClass::Api), Strategy::NetworkOnly);
        assert_eq!(Strategy::for_class(RequestClass::Static), Strategy::CacheFirst);
        assert_eq!(
            Strategy::for_class(RequestClass::Navigational),
            Strategy::CacheFirstWithOfflineDocument
        );
        assert_eq!(Strategy::for_class(RequestClass::Default), Strategy::NetworkFirst);
    }

    #[test]
    fn test_synthesized_fallbacks() {
        let api = synthesized_fallback(RequestClass::Api);
        assert_eq!(api.status, 503);
        assert_eq!(api.headers.get("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&api.body).unwrap();
        assert!(body["error"].is_string());

        assert_eq!(synthesized_fallback(RequestClass::Static).body_text(), "File not found");
        assert_eq!(synthesized_fallback(RequestClass::Navigational).body_text(), "Page not found");
        assert_eq!(synthesized_fallback(RequestClass::Default).status, 404);
    }

    #[tokio::test]
    async fn test_api_offline_returns_503_and_touches_no_cache() {
        let f = fixture(MockFetcher::new());
        f.fetcher.set_offline(true);

        let outcome = f.dispatcher.dispatch(RequestClass::Api, &get("/api/v1/chat")).await;
        assert!(matches!(outcome, StrategyOutcome::Fallback(_)));
        assert_eq!(outcome.response().status, 503);

        f.writes.flush().await;
        assert!(f.store.list_partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_success_is_never_cached() {
        let f = fixture(
            MockFetcher::new().with_route("/api/v1/chat", GatewayResponse::text(200, "{\"answer\":1}")),
        );

        let outcome = f.dispatcher.dispatch(RequestClass::Api, &get("/api/v1/chat")).await;
        assert_eq!(outcome.source(), "network");

        f.writes.flush().await;
        assert!(f.store.list_partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_cache_hit_makes_no_network_call() {
        let f = fixture(MockFetcher::site());
        let request = get("/static/style.css");
        f.store
            .put("enchat-static-v1", &request, &GatewayResponse::text(200, "cached"))
            .await
            .unwrap();

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &request).await;
        assert_eq!(
            outcome,
            StrategyOutcome::Cache {
                partition: "enchat-static-v1".into(),
                response: GatewayResponse::text(200, "cached"),
            }
        );
        assert_eq!(f.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_partition_read_before_static() {
        let f = fixture(MockFetcher::site());
        let request = get("/static/style.css");
        f.store
            .put("enchat-static-v1", &request, &GatewayResponse::text(200, "static"))
            .await
            .unwrap();
        f.store
            .put("enchat-dynamic-v1", &request, &GatewayResponse::text(200, "dynamic"))
            .await
            .unwrap();

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &request).await;
        assert_eq!(outcome.response().body_text(), "dynamic");
    }

    #[tokio::test]
    async fn test_static_miss_fetches_and_stores_in_dynamic() {
        let f = fixture(MockFetcher::new().with_route("/img/logo.png", GatewayResponse::text(200, "png")));
        let request = get("/img/logo.png");

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &request).await;
        assert_eq!(outcome.source(), "network");

        f.writes.flush().await;
        let hit = f
            .store
            .match_in(&["enchat-dynamic-v1"], &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response.body_text(), "png");

        f.fetcher.set_offline(true);
        let again = f.dispatcher.dispatch(RequestClass::Static, &request).await;
        assert_eq!(again.source(), "cache");
        assert_eq!(f.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_ok_live_response_is_returned_but_not_stored() {
        let f = fixture(MockFetcher::new());
        let request = get("/missing.js");

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &request).await;
        assert_eq!(outcome.source(), "network");
        assert_eq!(outcome.response().status, 404);

        f.writes.flush().await;
        assert!(f.store.keys("enchat-dynamic-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_offline_miss_is_plain_404() {
        let f = fixture(MockFetcher::new());
        f.fetcher.set_offline(true);

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &get("/src/app.js")).await;
        assert_eq!(outcome, StrategyOutcome::Fallback(synthesized_fallback(RequestClass::Static)));
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_offline_document() {
        let f = fixture(MockFetcher::new());
        f.store
            .put("enchat-static-v1", &get("/index.html"), &GatewayResponse::text(200, "<html>index</html>"))
            .await
            .unwrap();
        f.fetcher.set_offline(true);

        let outcome = f.dispatcher.dispatch(RequestClass::Navigational, &html("/chat/history")).await;
        assert_eq!(outcome.source(), "cache");
        assert_eq!(outcome.response().body_text(), "<html>index</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_document_is_404() {
        let f = fixture(MockFetcher::new());
        f.fetcher.set_offline(true);

        let outcome = f.dispatcher.dispatch(RequestClass::Navigational, &html("/chat")).await;
        assert_eq!(outcome.response().status, 404);
        assert_eq!(outcome.response().body_text(), "Page not found");
    }

    #[tokio::test]
    async fn test_network_first_prefers_live_and_stores_clone() {
        let f = fixture(MockFetcher::new().with_route("/manifest.json", GatewayResponse::text(200, "fresh")));
        let request = get("/manifest.json");
        f.store
            .put("enchat-dynamic-v1", &request, &GatewayResponse::text(200, "stale"))
            .await
            .unwrap();

        let outcome = f.dispatcher.dispatch(RequestClass::Default, &request).await;
        assert_eq!(outcome, StrategyOutcome::Network(GatewayResponse::text(200, "fresh")));

        f.writes.flush().await;
        let hit = f.store.match_in(&["enchat-dynamic-v1"], &request).await.unwrap().unwrap();
        assert_eq!(hit.response, GatewayResponse::text(200, "fresh"));
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache_then_404() {
        let f = fixture(MockFetcher::new());
        f.fetcher.set_offline(true);
        let cached = get("/manifest.json");
        f.store
            .put("enchat-static-v1", &cached, &GatewayResponse::text(200, "cached"))
            .await
            .unwrap();

        let hit = f.dispatcher.dispatch(RequestClass::Default, &cached).await;
        assert_eq!(hit.source(), "cache");

        let miss = f.dispatcher.dispatch(RequestClass::Default, &get("/other.json")).await;
        assert_eq!(miss.response().body_text(), "Resource not found");
    }

    #[tokio::test]
    async fn test_retired_dispatcher_answers_but_does_not_store() {
        let f = fixture(MockFetcher::new().with_route("/img/a.png", GatewayResponse::text(200, "a")));
        f.dispatcher.retire();

        let outcome = f.dispatcher.dispatch(RequestClass::Static, &get("/img/a.png")).await;
        assert_eq!(outcome.response().body_text(), "a");

        f.writes.flush().await;
        assert!(f.store.list_partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paused_writes_wait_for_the_gate() {
        let f = fixture(MockFetcher::new().with_route("/img/a.png", GatewayResponse::text(200, "a")));
        let paused = f.writes.pause().await;

        f.dispatcher.dispatch(RequestClass::Static, &get("/img/a.png")).await;
        tokio::task::yield_now().await;
        assert!(f.store.list_partition_names().await.unwrap().is_empty());

        drop(paused);
        f.writes.flush().await;
        assert_eq!(f.store.keys("enchat-dynamic-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_cache_write_does_not_fail_response() {
        let store = CacheStoreManager::new(Arc::new(MemoryStorage::with_quota(0)));
        let f = fixture_with(
            store,
            MockFetcher::new().with_route("/manifest.json", GatewayResponse::text(200, "ok")),
        );

        let outcome = f.dispatcher.dispatch(RequestClass::Default, &get("/manifest.json")).await;
        assert_eq!(outcome.response().body_text(), "ok");

        f.writes.flush().await;
        assert_eq!(f.writes.pending(), 0);
    }
}
