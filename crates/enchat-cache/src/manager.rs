//! Cache Store Manager: partition lifecycle and request-level access.

use crate::keys::validate_partition_name;
use crate::provider::CacheStorage;
use crate::types::{CacheHit, StoredEntry};
use enchat_core::ports::Fetcher;
use enchat_core::{Error, GatewayRequest, GatewayResponse, Result};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An opened partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHandle {
    name: String,
}

impl PartitionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owns the named partitions on top of a storage backend.
#[derive(Clone)]
pub struct CacheStoreManager {
    storage: Arc<dyn CacheStorage>,
}

impl CacheStoreManager {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Create or open a partition. Quota errors propagate unchanged.
    pub async fn open_partition(&self, name: &str) -> Result<PartitionHandle> {
        validate_partition_name(name)?;
        self.storage.open(name).await?;
        Ok(PartitionHandle {
            name: name.to_string(),
        })
    }

    /// Fetch every request and store the responses.
    ///
    /// Nothing is stored unless every fetch succeeded with an ok status.
    /// A storage failure half-way may leave a partial set behind; callers
    /// treat any `Err` as a failed step.
    pub async fn populate(
        &self,
        handle: &PartitionHandle,
        requests: &[GatewayRequest],
        fetcher: &dyn Fetcher,
    ) -> Result<usize> {
        let fetches = requests.iter().map(|request| async move {
            let response = fetcher
                .fetch(request)
                .await
                .map_err(|e| Error::PopulateFailed {
                    partition: handle.name.clone(),
                    url: request.url.to_string(),
                    reason: e.to_string(),
                })?;
            if !response.is_ok() {
                return Err(Error::PopulateFailed {
                    partition: handle.name.clone(),
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok((request, response))
        });

        let fetched = try_join_all(fetches).await?;
        for (request, response) in &fetched {
            self.put(&handle.name, request, response).await?;
        }

        info!(partition = %handle.name, entries = fetched.len(), "Partition populated");
        Ok(fetched.len())
    }

    /// First entry for `request` in the given partitions, in order.
    pub async fn match_in(
        &self,
        partitions: &[&str],
        request: &GatewayRequest,
    ) -> Result<Option<CacheHit>> {
        let key = request.cache_key();
        for partition in partitions {
            if let Some(entry) = self.storage.get(partition, &key).await? {
                debug!(partition, key = %key, "Cache hit");
                return Ok(Some(CacheHit {
                    partition: partition.to_string(),
                    response: entry.response,
                }));
            }
        }
        Ok(None)
    }

    /// Store a snapshot of `response` under the request identity.
    ///
    /// The caller keeps its own copy; the stored one is a clone.
    pub async fn put(
        &self,
        partition: &str,
        request: &GatewayRequest,
        response: &GatewayResponse,
    ) -> Result<()> {
        validate_partition_name(partition)?;
        request.ensure_cacheable()?;
        let entry = StoredEntry::new(request.cache_key(), response.clone());
        self.storage.put(partition, entry).await
    }

    pub async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        self.storage.keys(partition).await
    }

    pub async fn list_partition_names(&self) -> Result<BTreeSet<String>> {
        self.storage.partitions().await
    }

    pub async fn delete_partition(&self, name: &str) -> Result<bool> {
        validate_partition_name(name)?;
        let existed = self.storage.delete_partition(name).await?;
        if existed {
            info!(partition = name, "Deleted partition");
        } else {
            warn!(partition = name, "Partition to delete was not found");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use url::Url;

    /// Serves fixed statuses per path; unknown paths are network errors.
    struct PathFetcher {
        statuses: HashMap<String, u16>,
    }

    #[async_trait]
    impl Fetcher for PathFetcher {
        async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
            match self.statuses.get(request.path()) {
                Some(status) => Ok(GatewayResponse::text(*status, request.path())),
                None => Err(Error::Network("connection refused".into())),
            }
        }
    }

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    fn requests(paths: &[&str]) -> Vec<GatewayRequest> {
        paths
            .iter()
            .map(|p| GatewayRequest::get_path(&origin(), p).unwrap())
            .collect()
    }

    fn fetcher(entries: &[(&str, u16)]) -> PathFetcher {
        PathFetcher {
            statuses: entries.iter().map(|(p, s)| (p.to_string(), *s)).collect(),
        }
    }

    #[tokio::test]
    async fn test_populate_stores_all() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        let handle = manager.open_partition("enchat-static-v1").await.unwrap();
        let fetcher = fetcher(&[("/", 200), ("/static/style.css", 200)]);

        let stored = manager
            .populate(&handle, &requests(&["/", "/static/style.css"]), &fetcher)
            .await
            .unwrap();

        assert_eq!(stored, 2);
        assert_eq!(manager.keys("enchat-static-v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_populate_fails_on_bad_status_and_stores_nothing() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        let handle = manager.open_partition("enchat-static-v2").await.unwrap();
        let fetcher = fetcher(&[("/", 200), ("/static/style.css", 500)]);

        let err = manager
            .populate(&handle, &requests(&["/", "/static/style.css"]), &fetcher)
            .await
            .unwrap_err();

        match err {
            Error::PopulateFailed { url, reason, .. } => {
                assert!(url.ends_with("/static/style.css"));
                assert_eq!(reason, "status 500");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(manager.keys("enchat-static-v2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_populate_fails_on_network_error() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        let handle = manager.open_partition("p").await.unwrap();
        let fetcher = fetcher(&[("/", 200)]);

        let result = manager
            .populate(&handle, &requests(&["/", "/missing.js"]), &fetcher)
            .await;
        assert!(matches!(result, Err(Error::PopulateFailed { .. })));
    }

    #[tokio::test]
    async fn test_match_in_respects_order() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        let request = requests(&["/app.js"]).remove(0);
        manager
            .put("static", &request, &GatewayResponse::text(200, "old"))
            .await
            .unwrap();
        manager
            .put("dynamic", &request, &GatewayResponse::text(200, "new"))
            .await
            .unwrap();

        let hit = manager
            .match_in(&["dynamic", "static"], &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.partition, "dynamic");
        assert_eq!(hit.response.body_text(), "new");

        let hit = manager.match_in(&["static"], &request).await.unwrap().unwrap();
        assert_eq!(hit.response.body_text(), "old");

        assert!(manager.match_in(&["other"], &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        let request = GatewayRequest::new("POST", origin().join("/api/v1/chat").unwrap());
        let err = manager
            .put("dynamic", &request, &GatewayResponse::new(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let manager = CacheStoreManager::new(Arc::new(MemoryStorage::new()));
        manager.open_partition("a").await.unwrap();
        manager.open_partition("b").await.unwrap();

        assert!(manager.delete_partition("a").await.unwrap());
        assert!(!manager.delete_partition("a").await.unwrap());
        let names: Vec<_> = manager.list_partition_names().await.unwrap().into_iter().collect();
        assert_eq!(names, vec!["b".to_string()]);
    }
}
