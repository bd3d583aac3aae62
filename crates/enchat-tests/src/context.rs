//! Test context: a served gateway in front of a mock upstream.

use crate::fixtures::{SiteFixture, gateway_config};
use crate::helpers::{PageClient, start_test_server};
use async_trait::async_trait;
use enchat_cache::{CacheStoreManager, storage_from_config};
use enchat_core::config::StorageBackend;
use enchat_core::ports::Fetcher;
use enchat_core::{Error, GatewayConfig, GatewayRequest, GatewayResponse, Result};
use enchat_gateway::sync::queue_from_config;
use enchat_gateway::{Gateway, UpstreamFetcher};
use enchat_notify::create_presenter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use wiremock::MockServer;

/// Upstream fetcher with a network kill switch.
pub struct SwitchableFetcher {
    inner: UpstreamFetcher,
    offline: AtomicBool,
}

impl SwitchableFetcher {
    pub fn new(inner: UpstreamFetcher) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for SwitchableFetcher {
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("network unreachable".into()));
        }
        self.inner.fetch(request).await
    }
}

/// Drop this to stop the server.
pub struct TestContext {
    pub upstream: MockServer,
    pub gateway: Arc<Gateway>,
    pub network: Arc<SwitchableFetcher>,
    pub addr: SocketAddr,
    pub client: PageClient,
    server: tokio::task::JoinHandle<()>,
    _storage_dir: Option<TempDir>,
}

impl TestContext {
    /// Gateway `v1` with in-memory storage, installed and active.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Same as [`TestContext::new`] with filesystem storage in a temp dir.
    pub async fn with_filesystem() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path().to_path_buf();
        let mut ctx = Self::with_config(move |config| {
            config.storage.backend = StorageBackend::Filesystem;
            config.storage.root_dir = root;
        })
        .await?;
        ctx._storage_dir = Some(dir);
        Ok(ctx)
    }

    pub async fn with_config<F>(customize: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&mut GatewayConfig),
    {
        crate::init_test_logging();

        let upstream = MockServer::start().await;
        SiteFixture::mount(&upstream).await;

        let mut config = gateway_config(&upstream, "v1");
        customize(&mut config);

        let network = Arc::new(SwitchableFetcher::new(UpstreamFetcher::from_config(&config)?));
        let gateway = Arc::new(Gateway::new(
            config.clone(),
            CacheStoreManager::new(storage_from_config(&config.storage)),
            network.clone(),
            Arc::from(create_presenter(&config.push)),
            queue_from_config(&config.sync),
        ));
        gateway.start().await?;

        let (addr, server) = start_test_server(gateway.clone()).await?;
        Ok(Self {
            upstream,
            gateway,
            network,
            addr,
            client: PageClient::new(addr),
            server,
            _storage_dir: None,
        })
    }

    /// Requests the upstream received for `path`.
    pub async fn upstream_hits(&self, path: &str) -> usize {
        self.upstream
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .count()
    }

    /// Every later upstream fetch fails with a network error.
    pub fn go_offline(&self) {
        self.network.set_offline(true);
    }

    pub fn go_online(&self) {
        self.network.set_offline(false);
    }

    /// Wait for write-behind cache stores to land.
    pub async fn settle(&self) {
        self.gateway.flush_writes().await;
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}
