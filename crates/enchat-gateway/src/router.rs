//! Event router.
//!
//! Every event the host delivers maps to one handler function on
//! [`Gateway`]. Handlers are plain async methods and can be called
//! directly; [`Gateway::handle`] is the single dispatch point.

use crate::classifier::{BypassReason, Classification, RequestClass};
use crate::clients::ClientRegistry;
use crate::control::{ControlMessage, ControlReply, VersionReply};
use crate::lifecycle::{InstallOutcome, LifecycleController};
use crate::network::UpstreamFetcher;
use crate::strategy::{StrategyOutcome, WriteBehind};
use crate::sync::{BackgroundSync, SyncReport, queue_from_config};
use enchat_cache::{CacheStoreManager, storage_from_config};
use enchat_core::ports::{ActionQueue, ClientController, Fetcher, WindowAction};
use enchat_core::{ClientId, Error, GatewayConfig, GatewayRequest, GatewayResponse, Result};
use enchat_notify::{NotificationAction, NotificationPresenter, PushNotification, create_presenter};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events delivered by the host environment.
#[derive(Debug)]
pub enum GatewayEvent {
    Install(GatewayConfig),
    Activate,
    Fetch {
        request: GatewayRequest,
        client: Option<ClientId>,
    },
    Message(Value),
    Push(Option<Vec<u8>>),
    NotificationClick(Option<NotificationAction>),
    Sync(String),
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallOutcome),
    Activated { version: String },
    Fetched(FetchOutcome),
    Message(ControlReply),
    Pushed(PushNotification),
    NotificationClicked(Option<WindowAction>),
    Synced(Option<SyncReport>),
}

/// How a fetch was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "detail", rename_all = "snake_case")]
pub enum FetchRoute {
    /// Left to the network by the classifier.
    Bypass(BypassReason),
    /// No active version; passed through.
    Uncontrolled,
    /// Handled by the strategy for this class.
    Class(RequestClass),
}

impl FetchRoute {
    pub fn label(&self) -> &'static str {
        match self {
            FetchRoute::Bypass(_) => "bypass",
            FetchRoute::Uncontrolled => "uncontrolled",
            FetchRoute::Class(class) => class.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub route: FetchRoute,
    pub outcome: StrategyOutcome,
}

impl FetchOutcome {
    pub fn into_response(self) -> GatewayResponse {
        self.outcome.into_response()
    }
}

pub struct Gateway {
    config: Arc<GatewayConfig>,
    store: CacheStoreManager,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<ClientRegistry>,
    lifecycle: LifecycleController,
    presenter: Arc<dyn NotificationPresenter>,
    sync: BackgroundSync,
    writes: WriteBehind,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        store: CacheStoreManager,
        fetcher: Arc<dyn Fetcher>,
        presenter: Arc<dyn NotificationPresenter>,
        queue: Arc<dyn ActionQueue>,
    ) -> Self {
        let writes = WriteBehind::new();
        let clients = Arc::new(ClientRegistry::new());
        let lifecycle =
            LifecycleController::new(store.clone(), fetcher.clone(), clients.clone(), writes.clone());
        let sync = BackgroundSync::new(
            config.sync.tag.clone(),
            config.origin.clone(),
            queue,
            fetcher.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            fetcher,
            clients,
            lifecycle,
            presenter,
            sync,
            writes,
        }
    }

    /// Wire storage, upstream, presenter and queue from configuration.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let store = CacheStoreManager::new(storage_from_config(&config.storage));
        let fetcher = Arc::new(UpstreamFetcher::from_config(&config)?);
        let presenter: Arc<dyn NotificationPresenter> = Arc::from(create_presenter(&config.push));
        let queue = queue_from_config(&config.sync);
        Ok(Self::new(config, store, fetcher, presenter, queue))
    }

    /// Install the configured version.
    pub async fn start(&self) -> Result<InstallOutcome> {
        self.on_install(self.config.as_ref().clone()).await
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStoreManager {
        &self.store
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn queue(&self) -> &Arc<dyn ActionQueue> {
        self.sync.queue()
    }

    /// Wait for pending write-behind cache stores.
    pub async fn flush_writes(&self) {
        self.writes.flush().await;
    }

    pub async fn handle(&self, event: GatewayEvent) -> Result<EventOutcome> {
        match event {
            GatewayEvent::Install(config) => self.on_install(config).await.map(EventOutcome::Installed),
            GatewayEvent::Activate => self
                .on_activate()
                .await
                .map(|version| EventOutcome::Activated { version }),
            GatewayEvent::Fetch { request, client } => {
                Ok(EventOutcome::Fetched(self.on_fetch(request, client).await))
            }
            GatewayEvent::Message(payload) => self.on_message(&payload).await.map(EventOutcome::Message),
            GatewayEvent::Push(payload) => self
                .on_push(payload.as_deref())
                .await
                .map(EventOutcome::Pushed),
            GatewayEvent::NotificationClick(action) => self
                .on_notification_click(action)
                .await
                .map(EventOutcome::NotificationClicked),
            GatewayEvent::Sync(tag) => self.on_sync(&tag).await.map(EventOutcome::Synced),
        }
    }

    pub async fn on_install(&self, config: GatewayConfig) -> Result<InstallOutcome> {
        self.lifecycle.install(config).await
    }

    /// Install `version` using the running configuration otherwise.
    pub async fn install_version(&self, version: &str) -> Result<InstallOutcome> {
        self.on_install(self.config.with_version(version)).await
    }

    pub async fn on_activate(&self) -> Result<String> {
        self.lifecycle.activate().await
    }

    /// The interception point. Never fails: network trouble becomes a
    /// fallback response.
    pub async fn on_fetch(&self, request: GatewayRequest, client: Option<ClientId>) -> FetchOutcome {
        if let Some(client) = client {
            self.clients.register(client).await;
        }

        let Some(runtime) = self.lifecycle.active().await else {
            return FetchOutcome {
                route: FetchRoute::Uncontrolled,
                outcome: self.pass_through(&request).await,
            };
        };

        match runtime.classifier.classify(&request) {
            Classification::Bypass(reason) => {
                debug!(method = %request.method, url = %request.url, ?reason, "Bypassing");
                FetchOutcome {
                    route: FetchRoute::Bypass(reason),
                    outcome: self.pass_through(&request).await,
                }
            }
            Classification::Handle(class) => FetchOutcome {
                route: FetchRoute::Class(class),
                outcome: runtime.dispatcher.dispatch(class, &request).await,
            },
        }
    }

    pub async fn on_message(&self, payload: &Value) -> Result<ControlReply> {
        match ControlMessage::parse(payload) {
            Some(ControlMessage::SkipWaiting) => {
                let activated = self.lifecycle.skip_waiting().await?;
                Ok(ControlReply::SkipWaiting { activated })
            }
            Some(ControlMessage::GetVersion) => {
                let version = self.lifecycle.version().await.ok_or(Error::NoActiveInstance)?;
                Ok(ControlReply::Version(VersionReply { version }))
            }
            None => {
                debug!("Ignoring unknown control message");
                Ok(ControlReply::Ignored)
            }
        }
    }

    pub async fn on_push(&self, payload: Option<&[u8]>) -> Result<PushNotification> {
        let notification = PushNotification::from_push(payload, &self.config.push);
        self.presenter.show(&notification).await?;
        info!(title = %notification.title, "Notification shown");
        Ok(notification)
    }

    pub async fn on_notification_click(
        &self,
        action: Option<NotificationAction>,
    ) -> Result<Option<WindowAction>> {
        match action {
            Some(NotificationAction::Open) => self
                .clients
                .focus_or_open(&self.config.push.open_url)
                .await
                .map(Some),
            Some(NotificationAction::Dismiss) | None => Ok(None),
        }
    }

    pub async fn on_sync(&self, tag: &str) -> Result<Option<SyncReport>> {
        self.sync.handle(tag).await
    }

    async fn pass_through(&self, request: &GatewayRequest) -> StrategyOutcome {
        match self.fetcher.fetch(request).await {
            Ok(response) => StrategyOutcome::Network(response),
            Err(e) => {
                warn!(method = %request.method, url = %request.url, error = %e, "Upstream unavailable");
                StrategyOutcome::Fallback(GatewayResponse::text(502, "Bad Gateway"))
            }
        }
    }
}
