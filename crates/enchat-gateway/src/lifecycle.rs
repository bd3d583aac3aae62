//! Lifecycle controller: install, waiting, activation and eviction.
//!
//! Each installed version is an instance with its own configuration,
//! classifier and dispatcher. At most one instance is active and at most
//! one waits behind it. A version whose install fails never activates, so
//! the active one keeps serving from its own partitions.

use crate::classifier::RequestClassifier;
use crate::strategy::{StrategyDispatcher, WriteBehind};
use enchat_cache::{CacheStoreManager, PartitionKind, PartitionSet, is_stale};
use enchat_core::ports::{ClientController, Fetcher};
use enchat_core::{Error, GatewayConfig, GatewayRequest, InstanceId, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

/// Everything a version needs to serve requests.
pub struct InstanceRuntime {
    pub config: Arc<GatewayConfig>,
    pub classifier: RequestClassifier,
    pub dispatcher: StrategyDispatcher,
}

struct WorkerInstance {
    id: InstanceId,
    state: LifecycleState,
    partitions: PartitionSet,
    runtime: Arc<InstanceRuntime>,
}

impl WorkerInstance {
    fn info(&self) -> InstanceInfo {
        InstanceInfo {
            id: self.id.to_string(),
            version: self.runtime.config.version.clone(),
            state: self.state,
        }
    }

    fn retire(mut self) -> InstanceInfo {
        self.runtime.dispatcher.retire();
        self.state = LifecycleState::Redundant;
        info!(version = %self.runtime.config.version, "Instance is redundant");
        self.info()
    }
}

/// Snapshot of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub id: String,
    pub version: String,
    pub state: LifecycleState,
}

/// Snapshot of the whole registration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationInfo {
    pub active: Option<InstanceInfo>,
    pub waiting: Option<InstanceInfo>,
    pub installing: Option<InstanceInfo>,
    pub last_redundant: Option<InstanceInfo>,
    pub last_install_error: Option<String>,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallOutcome {
    /// Installed and activated right away.
    Activated { version: String, precached: usize },
    /// Installed; waiting for the active version to step aside.
    Waiting { version: String, precached: usize },
}

#[derive(Default)]
struct Registration {
    active: Option<WorkerInstance>,
    waiting: Option<WorkerInstance>,
    installing: Option<InstanceInfo>,
    last_redundant: Option<InstanceInfo>,
    last_install_error: Option<String>,
}

pub struct LifecycleController {
    store: CacheStoreManager,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientController>,
    writes: WriteBehind,
    registration: RwLock<Registration>,
    install_lock: Mutex<()>,
}

impl LifecycleController {
    pub fn new(
        store: CacheStoreManager,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientController>,
        writes: WriteBehind,
    ) -> Self {
        Self {
            store,
            fetcher,
            clients,
            writes,
            registration: RwLock::new(Registration::default()),
            install_lock: Mutex::new(()),
        }
    }

    /// Install a version: precache its static partition, then wait or
    /// activate. Installs are serialized.
    pub async fn install(&self, config: GatewayConfig) -> Result<InstallOutcome> {
        let _guard = self.install_lock.lock().await;
        config.validate()?;

        let version = config.version.clone();
        let skip_waiting = config.skip_waiting;
        let mut instance = self.new_instance(config);
        info!(version = %version, "Installing");
        self.registration.write().await.installing = Some(instance.info());

        let precached = match self.precache(&instance).await {
            Ok(count) => count,
            Err(e) => {
                error!(version = %version, error = %e, "Install failed");
                let mut reg = self.registration.write().await;
                reg.installing = None;
                reg.last_install_error = Some(e.to_string());
                reg.last_redundant = Some(instance.retire());
                return Err(Error::InstallFailed {
                    version,
                    reason: e.to_string(),
                });
            }
        };

        let activate_now = {
            let mut reg = self.registration.write().await;
            reg.installing = None;
            reg.last_install_error = None;
            if let Some(previous) = reg.waiting.take() {
                reg.last_redundant = Some(previous.retire());
            }
            instance.state = LifecycleState::Waiting;
            reg.waiting = Some(instance);
            reg.active.is_none() || skip_waiting
        };
        info!(version = %version, precached, "Installed");

        if activate_now {
            self.activate().await?;
            Ok(InstallOutcome::Activated { version, precached })
        } else {
            Ok(InstallOutcome::Waiting { version, precached })
        }
    }

    /// Promote the waiting instance and evict stale partitions.
    ///
    /// With nothing waiting this only re-runs eviction for the active
    /// version, so repeated calls never touch its partitions.
    pub async fn activate(&self) -> Result<String> {
        let mut reg = self.registration.write().await;
        let Some(mut next) = reg.waiting.take() else {
            let Some(active) = reg.active.as_ref() else {
                return Err(Error::NoActiveInstance);
            };
            let version = active.runtime.config.version.clone();
            self.evict_stale(&active.partitions).await?;
            return Ok(version);
        };

        let version = next.runtime.config.version.clone();
        next.state = LifecycleState::Activating;
        info!(version = %version, "Activating");

        // The outgoing version may still have fetches in flight; once
        // retired they no longer reach its partitions.
        if let Some(previous) = reg.active.as_ref() {
            previous.runtime.dispatcher.retire();
        }
        self.writes.flush().await;

        if let Err(e) = self.evict_stale(&next.partitions).await {
            error!(version = %version, error = %e, "Activation failed");
            if let Some(previous) = reg.active.as_ref() {
                previous.runtime.dispatcher.reinstate();
            }
            next.state = LifecycleState::Waiting;
            reg.waiting = Some(next);
            return Err(e);
        }

        if let Some(previous) = reg.active.take() {
            reg.last_redundant = Some(previous.retire());
        }
        next.state = LifecycleState::Active;
        reg.active = Some(next);
        drop(reg);

        if let Err(e) = self.clients.claim(&version).await {
            warn!(version = %version, error = %e, "Failed to claim clients");
        }
        info!(version = %version, "Activated");
        Ok(version)
    }

    /// Force the waiting instance to activate. Returns whether one was
    /// waiting.
    pub async fn skip_waiting(&self) -> Result<bool> {
        if self.registration.read().await.waiting.is_none() {
            return Ok(false);
        }
        self.activate().await?;
        Ok(true)
    }

    /// Runtime of the active instance.
    pub async fn active(&self) -> Option<Arc<InstanceRuntime>> {
        self.registration
            .read()
            .await
            .active
            .as_ref()
            .map(|instance| instance.runtime.clone())
    }

    /// Version tag of the active instance.
    pub async fn version(&self) -> Option<String> {
        self.registration
            .read()
            .await
            .active
            .as_ref()
            .map(|instance| instance.runtime.config.version.clone())
    }

    pub async fn snapshot(&self) -> RegistrationInfo {
        let reg = self.registration.read().await;
        RegistrationInfo {
            active: reg.active.as_ref().map(WorkerInstance::info),
            waiting: reg.waiting.as_ref().map(WorkerInstance::info),
            installing: reg.installing.clone(),
            last_redundant: reg.last_redundant.clone(),
            last_install_error: reg.last_install_error.clone(),
        }
    }

    fn new_instance(&self, config: GatewayConfig) -> WorkerInstance {
        let dispatcher = StrategyDispatcher::new(
            &config,
            self.store.clone(),
            self.fetcher.clone(),
            self.writes.clone(),
        );
        WorkerInstance {
            id: InstanceId::new(),
            state: LifecycleState::Installing,
            partitions: PartitionSet::for_config(&config),
            runtime: Arc::new(InstanceRuntime {
                classifier: RequestClassifier::new(&config),
                dispatcher,
                config: Arc::new(config),
            }),
        }
    }

    async fn precache(&self, instance: &WorkerInstance) -> Result<usize> {
        let config = &instance.runtime.config;
        let handle = self
            .store
            .open_partition(instance.partitions.name(PartitionKind::Static))
            .await?;
        let requests = config
            .precache
            .iter()
            .map(|path| GatewayRequest::get_path(&config.origin, path))
            .collect::<Result<Vec<_>>>()?;
        self.store
            .populate(&handle, &requests, self.fetcher.as_ref())
            .await
    }

    async fn evict_stale(&self, retained: &PartitionSet) -> Result<()> {
        let _paused = self.writes.pause().await;
        let names = self.store.list_partition_names().await?;
        for name in names.iter().filter(|name| is_stale(name, retained)) {
            info!(partition = %name, "Deleting stale partition");
            self.store.delete_partition(name).await?;
        }
        Ok(())
    }
}
