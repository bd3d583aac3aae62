//! Pages served by the gateway.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use enchat_core::ClientId;
use enchat_core::Result;
use enchat_core::ports::{ClientController, WindowAction};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Pages not seen for this long are forgotten.
const CLIENT_TTL_MINUTES: i64 = 30;
const MAX_CLIENTS: usize = 1024;
const MAX_OPENED_WINDOWS: usize = 32;

#[derive(Default)]
struct ClientState {
    last_seen: HashMap<ClientId, DateTime<Utc>>,
    controller: Option<String>,
    opened: VecDeque<String>,
}

impl ClientState {
    fn prune(&mut self, ttl: TimeDelta) {
        let cutoff = Utc::now() - ttl;
        let before = self.last_seen.len();
        self.last_seen.retain(|_, seen| *seen >= cutoff);
        let expired = before - self.last_seen.len();
        if expired > 0 {
            debug!(expired, "Forgot idle clients");
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .last_seen
            .iter()
            .min_by_key(|(_, seen)| **seen)
            .map(|(client, _)| client.clone());
        if let Some(client) = oldest {
            self.last_seen.remove(&client);
        }
    }
}

/// In-process registry of the pages talking to the gateway.
///
/// Client ids come from request headers, so the registry is bounded: idle
/// pages expire and the least recently seen page makes room for a new one.
pub struct ClientRegistry {
    state: RwLock<ClientState>,
    ttl: TimeDelta,
    max_clients: usize,
    max_opened: usize,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_limits(
            TimeDelta::minutes(CLIENT_TTL_MINUTES),
            MAX_CLIENTS,
            MAX_OPENED_WINDOWS,
        )
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: TimeDelta, max_clients: usize, max_opened: usize) -> Self {
        Self {
            state: RwLock::new(ClientState::default()),
            ttl,
            max_clients: max_clients.max(1),
            max_opened: max_opened.max(1),
        }
    }

    /// Version currently controlling the pages.
    pub async fn controller(&self) -> Option<String> {
        self.state.read().await.controller.clone()
    }

    pub async fn clients(&self) -> Vec<ClientId> {
        let mut clients: Vec<_> = self.state.read().await.last_seen.keys().cloned().collect();
        clients.sort();
        clients
    }

    /// URLs requested through `focus_or_open` while no page was known.
    pub async fn opened_windows(&self) -> Vec<String> {
        self.state.read().await.opened.iter().cloned().collect()
    }
}

#[async_trait]
impl ClientController for ClientRegistry {
    async fn register(&self, client: ClientId) {
        let mut state = self.state.write().await;
        state.prune(self.ttl);
        if !state.last_seen.contains_key(&client) && state.last_seen.len() >= self.max_clients {
            state.evict_oldest();
        }
        if state.last_seen.insert(client.clone(), Utc::now()).is_none() {
            debug!(client = %client, "New client");
        }
    }

    async fn claim(&self, version: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        state.prune(self.ttl);
        state.controller = Some(version.to_string());
        let claimed = state.last_seen.len();
        info!(version, clients = claimed, "Claimed clients");
        Ok(claimed)
    }

    async fn focus_or_open(&self, url: &str) -> Result<WindowAction> {
        let mut state = self.state.write().await;
        state.prune(self.ttl);
        let recent = state
            .last_seen
            .iter()
            .max_by_key(|(_, seen)| **seen)
            .map(|(client, _)| client.clone());

        match recent {
            Some(client) => {
                info!(client = %client, "Focusing client");
                Ok(WindowAction::Focused { client })
            }
            None => {
                info!(url, "Opening window");
                if state.opened.len() >= self.max_opened {
                    state.opened.pop_front();
                }
                state.opened.push_back(url.to_string());
                Ok(WindowAction::Opened {
                    url: url.to_string(),
                })
            }
        }
    }
}
