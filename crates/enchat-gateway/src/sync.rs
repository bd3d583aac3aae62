//! Background sync: replay of actions queued while offline.

use async_trait::async_trait;
use enchat_core::ports::{ActionQueue, Fetcher, PendingAction};
use enchat_core::config::SyncConfig;
use enchat_core::{ActionId, Error, GatewayRequest, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Queue held in memory; lost on restart.
#[derive(Default)]
pub struct MemoryActionQueue {
    actions: Mutex<Vec<PendingAction>>,
}

impl MemoryActionQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionQueue for MemoryActionQueue {
    async fn enqueue(&self, action: PendingAction) -> Result<()> {
        self.actions.lock().await.push(action);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingAction>> {
        Ok(self.actions.lock().await.clone())
    }

    async fn remove(&self, id: ActionId) -> Result<()> {
        let mut actions = self.actions.lock().await;
        let before = actions.len();
        actions.retain(|action| action.id != id);
        if actions.len() == before {
            return Err(Error::ActionNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn record_attempt(&self, id: ActionId) -> Result<()> {
        let mut actions = self.actions.lock().await;
        let action = actions
            .iter_mut()
            .find(|action| action.id == id)
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;
        action.attempts += 1;
        Ok(())
    }
}

#[derive(Default, Serialize, Deserialize)]
struct QueueDocument {
    actions: Vec<PendingAction>,
}

/// Queue persisted as one JSON document, rewritten on every change.
pub struct FileActionQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileActionQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<QueueDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(QueueDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &QueueDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, id: ActionId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<PendingAction>, usize),
    {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        let index = document
            .actions
            .iter()
            .position(|action| action.id == id)
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;
        apply(&mut document.actions, index);
        self.save(&document).await
    }
}

#[async_trait]
impl ActionQueue for FileActionQueue {
    async fn enqueue(&self, action: PendingAction) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        document.actions.push(action);
        self.save(&document).await
    }

    async fn pending(&self) -> Result<Vec<PendingAction>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.actions)
    }

    async fn remove(&self, id: ActionId) -> Result<()> {
        self.update(id, |actions, index| {
            actions.remove(index);
        })
        .await
    }

    async fn record_attempt(&self, id: ActionId) -> Result<()> {
        self.update(id, |actions, index| actions[index].attempts += 1)
            .await
    }
}

/// Build the queue described by the configuration.
pub fn queue_from_config(config: &SyncConfig) -> Arc<dyn ActionQueue> {
    match &config.queue_path {
        Some(path) => Arc::new(FileActionQueue::new(path.clone())),
        None => Arc::new(MemoryActionQueue::new()),
    }
}

/// Result of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub replayed: usize,
    pub failed: usize,
    pub remaining: usize,
}

/// Replay hook registered under a tag.
pub struct BackgroundSync {
    tag: String,
    origin: Url,
    queue: Arc<dyn ActionQueue>,
    fetcher: Arc<dyn Fetcher>,
    /// One replay pass at a time, so no action is submitted twice.
    pass: Mutex<()>,
}

impl BackgroundSync {
    pub fn new(
        tag: impl Into<String>,
        origin: Url,
        queue: Arc<dyn ActionQueue>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            tag: tag.into(),
            origin,
            queue,
            fetcher,
            pass: Mutex::new(()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn queue(&self) -> &Arc<dyn ActionQueue> {
        &self.queue
    }

    /// Replay when `tag` is ours; other tags are ignored.
    pub async fn handle(&self, tag: &str) -> Result<Option<SyncReport>> {
        if tag != self.tag {
            debug!(tag, "Ignoring sync tag");
            return Ok(None);
        }
        self.replay().await.map(Some)
    }

    /// Submit every queued action once, oldest first.
    ///
    /// A failing action is counted and left queued; the pass carries on
    /// with the next one.
    pub async fn replay(&self) -> Result<SyncReport> {
        let _pass = self.pass.lock().await;
        let actions = self.queue.pending().await?;
        let mut report = SyncReport::default();

        for action in actions {
            match self.replay_action(&action).await {
                Ok(()) => {
                    debug!(action_id = %action.id, path = %action.path, "Replayed action");
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!(action_id = %action.id, path = %action.path, error = %e, "Replay failed");
                    if let Err(e) = self.queue.record_attempt(action.id).await {
                        warn!(action_id = %action.id, error = %e, "Failed to record replay attempt");
                    }
                    report.failed += 1;
                }
            }
        }

        report.remaining = self.queue.pending().await?.len();
        info!(
            replayed = report.replayed,
            failed = report.failed,
            remaining = report.remaining,
            "Background sync finished"
        );
        Ok(report)
    }

    async fn replay_action(&self, action: &PendingAction) -> Result<()> {
        let request = self.to_request(action)?;
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_ok() {
            return Err(Error::Network(format!(
                "upstream answered {}",
                response.status
            )));
        }
        self.queue.remove(action.id).await
    }

    fn to_request(&self, action: &PendingAction) -> Result<GatewayRequest> {
        let mut request = GatewayRequest::new(action.method.clone(), self.origin.join(&action.path)?);
        request.headers = action.headers.clone();
        if let Some(body) = &action.body {
            request = request
                .with_header("content-type", "application/json")
                .with_body(serde_json::to_vec(body)?);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockFetcher, origin};
    use enchat_core::GatewayResponse;
    use serde_json::json;
    use tempfile::TempDir;

    fn sync_with(queue: Arc<dyn ActionQueue>, fetcher: Arc<MockFetcher>) -> BackgroundSync {
        BackgroundSync::new("background-sync", origin(), queue, fetcher)
    }

    #[tokio::test]
    async fn test_memory_queue_remove_unknown() {
        let queue = MemoryActionQueue::new();
        let err = queue.remove(ActionId::new()).await.unwrap_err();
        assert!(matches!(err, Error::ActionNotFound(_)));
    }

    #[tokio::test]
    async fn test_file_queue_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sync/queue.json");

        let action = PendingAction::new("/api/v1/chat", Some(json!({"message": "hi"})));
        let id = action.id;
        FileActionQueue::new(&path).enqueue(action).await.unwrap();

        let reopened = FileActionQueue::new(&path);
        reopened.record_attempt(id).await.unwrap();
        let pending = reopened.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);

        reopened.remove(id).await.unwrap();
        assert!(FileActionQueue::new(&path).pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_queue_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let queue = FileActionQueue::new(temp.path().join("queue.json"));
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replay_removes_only_successful_actions() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_route("/api/v1/chat", GatewayResponse::json(200, &json!({"ok": true})))
                .with_route("/api/v1/fail", GatewayResponse::text(500, "boom")),
        );
        let queue: Arc<dyn ActionQueue> = Arc::new(MemoryActionQueue::new());
        queue
            .enqueue(PendingAction::new("/api/v1/chat", Some(json!({"message": "hi"}))))
            .await
            .unwrap();
        queue
            .enqueue(PendingAction::new("/api/v1/fail", None))
            .await
            .unwrap();

        let sync = sync_with(queue.clone(), fetcher.clone());
        let report = sync.handle("background-sync").await.unwrap().unwrap();
        assert_eq!(
            report,
            SyncReport {
                replayed: 1,
                failed: 1,
                remaining: 1
            }
        );

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].path, "/api/v1/fail");
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(
            fetcher.seen(),
            vec!["POST /api/v1/chat".to_string(), "POST /api/v1/fail".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replay_offline_keeps_queue() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);
        let queue: Arc<dyn ActionQueue> = Arc::new(MemoryActionQueue::new());
        queue
            .enqueue(PendingAction::new("/api/v1/chat", None))
            .await
            .unwrap();

        let report = sync_with(queue, fetcher).replay().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_bad_action_does_not_stop_the_pass() {
        let fetcher = Arc::new(
            MockFetcher::new().with_route("/api/v1/chat", GatewayResponse::json(200, &json!({}))),
        );
        let queue: Arc<dyn ActionQueue> = Arc::new(MemoryActionQueue::new());
        queue
            .enqueue(PendingAction::new("http://[bad", None))
            .await
            .unwrap();
        queue
            .enqueue(PendingAction::new("/api/v1/chat", None))
            .await
            .unwrap();

        let report = sync_with(queue.clone(), fetcher.clone()).replay().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                replayed: 1,
                failed: 1,
                remaining: 1
            }
        );
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].path, "http://[bad");
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(fetcher.seen(), vec!["POST /api/v1/chat".to_string()]);
    }

    #[tokio::test]
    async fn test_other_tags_ignored() {
        let fetcher = Arc::new(MockFetcher::new());
        let sync = sync_with(Arc::new(MemoryActionQueue::new()), fetcher.clone());
        assert_eq!(sync.handle("periodic-refresh").await.unwrap(), None);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_queue_from_config() {
        let temp = TempDir::new().unwrap();
        let config = SyncConfig {
            queue_path: Some(temp.path().join("queue.json")),
            ..SyncConfig::default()
        };
        let queue = queue_from_config(&config);
        queue.enqueue(PendingAction::new("/api/x", None)).await.unwrap();
        assert!(temp.path().join("queue.json").exists());
    }
}
