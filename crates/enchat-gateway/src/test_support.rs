//! Shared fixtures for unit tests.

use async_trait::async_trait;
use enchat_core::ports::Fetcher;
use enchat_core::{Error, GatewayConfig, GatewayRequest, GatewayResponse, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

/// A fetch held open until released.
#[derive(Clone, Default)]
pub(crate) struct FetchGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl FetchGate {
    /// Wait until the held fetch has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// In-process origin with an on/off network switch.
#[derive(Default)]
pub(crate) struct MockFetcher {
    routes: Mutex<HashMap<String, GatewayResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    held: Mutex<HashMap<String, FetchGate>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Site serving the test precache list.
    pub fn site() -> Self {
        Self::new()
            .with_route("/", GatewayResponse::text(200, "<html>root</html>"))
            .with_route("/index.html", GatewayResponse::text(200, "<html>index</html>"))
            .with_route("/static/style.css", GatewayResponse::text(200, "body{}"))
    }

    pub fn with_route(self, path: &str, response: GatewayResponse) -> Self {
        self.set_route(path, response);
        self
    }

    pub fn set_route(&self, path: &str, response: GatewayResponse) {
        self.routes.lock().unwrap().insert(path.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold fetches of `path` until the returned gate is released.
    pub fn hold(&self, path: &str) -> FetchGate {
        let gate = FetchGate::default();
        self.held.lock().unwrap().insert(path.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method, request.path()));

        let gate = self.held.lock().unwrap().get(request.path()).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(request.path())
            .cloned()
            .unwrap_or_else(|| GatewayResponse::text(404, "upstream: not found")))
    }
}

pub(crate) fn origin() -> Url {
    Url::parse("http://localhost:8080").unwrap()
}

pub(crate) fn get(path: &str) -> GatewayRequest {
    GatewayRequest::get_path(&origin(), path).unwrap()
}

pub(crate) fn html(path: &str) -> GatewayRequest {
    get(path).with_header("accept", "text/html")
}

/// Small precache list served by `MockFetcher::site`.
pub(crate) fn test_config(version: &str) -> GatewayConfig {
    GatewayConfig {
        version: version.to_string(),
        origin: origin(),
        precache: vec!["/".into(), "/index.html".into(), "/static/style.css".into()],
        ..GatewayConfig::default()
    }
}
