//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the gateway and the world
//! around it: the network, the pages it controls and the durable queue of
//! actions that failed while offline.

use crate::http::{GatewayRequest, GatewayResponse, Headers};
use crate::ids::{ActionId, ClientId};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live network access.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a live fetch.
    ///
    /// `Err` means the network failed (unreachable, DNS, timeout). Any HTTP
    /// status, including 4xx/5xx, is an `Ok` response.
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse>;
}

/// Pages served by the gateway.
#[async_trait]
pub trait ClientController: Send + Sync {
    /// Record a page that talked to the gateway.
    async fn register(&self, client: ClientId);

    /// Take control of every known page on behalf of `version`.
    async fn claim(&self, version: &str) -> Result<usize>;

    /// Focus an existing page, or open `url` when there is none.
    async fn focus_or_open(&self, url: &str) -> Result<WindowAction>;
}

/// What `focus_or_open` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowAction {
    Focused { client: ClientId },
    Opened { url: String },
}

/// An action the page could not submit while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    #[serde(default = "default_action_method")]
    pub method: String,
    /// Path on the upstream, e.g. `/api/v1/chat`.
    pub path: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

fn default_action_method() -> String {
    "POST".to_string()
}

impl PendingAction {
    pub fn new(path: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            id: ActionId::new(),
            method: default_action_method(),
            path: path.into(),
            headers: Headers::new(),
            body,
            queued_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// Durable queue of actions awaiting background sync.
#[async_trait]
pub trait ActionQueue: Send + Sync {
    /// Append an action.
    async fn enqueue(&self, action: PendingAction) -> Result<()>;

    /// All queued actions, oldest first.
    async fn pending(&self) -> Result<Vec<PendingAction>>;

    /// Remove a replayed action.
    async fn remove(&self, id: ActionId) -> Result<()>;

    /// Count a failed replay attempt.
    async fn record_attempt(&self, id: ActionId) -> Result<()>;
}
