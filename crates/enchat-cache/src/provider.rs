//! Cache storage trait and implementations.

use crate::compression::{compress, decompress};
use crate::keys::{entry_file_name, sanitize_key, validate_partition_name};
use crate::types::StoredEntry;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use enchat_core::config::{Compression, StorageBackend, StorageConfig};
use enchat_core::http::{GatewayResponse, Headers};
use enchat_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for partition storage backends.
///
/// Every method is individually atomic; no operation spans partitions.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create a partition if it does not exist yet.
    async fn open(&self, partition: &str) -> Result<()>;

    /// Look up an entry. A missing partition is a miss.
    async fn get(&self, partition: &str, key: &str) -> Result<Option<StoredEntry>>;

    /// Store an entry, replacing any previous one with the same key.
    /// Creates the partition when needed.
    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<()>;

    /// Keys stored in a partition.
    async fn keys(&self, partition: &str) -> Result<Vec<String>>;

    /// Names of all partitions.
    async fn partitions(&self) -> Result<BTreeSet<String>>;

    /// Delete a partition. Returns whether it existed.
    async fn delete_partition(&self, partition: &str) -> Result<bool>;
}

/// Build the backend selected in the configuration.
pub fn storage_from_config(config: &StorageConfig) -> Arc<dyn CacheStorage> {
    match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Filesystem => Arc::new(FilesystemStorage::new(
            config.root_dir.clone(),
            config.compression,
        )),
    }
}

type Partitions = BTreeMap<String, BTreeMap<String, StoredEntry>>;

/// Process-local storage.
#[derive(Default)]
pub struct MemoryStorage {
    partitions: RwLock<Partitions>,
    max_entries: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses new entries once `max_entries` are held.
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            partitions: RwLock::new(BTreeMap::new()),
            max_entries: Some(max_entries),
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        self.partitions
            .write()
            .await
            .entry(partition.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<StoredEntry>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<()> {
        let mut partitions = self.partitions.write().await;

        if let Some(max) = self.max_entries {
            let held: usize = partitions.values().map(BTreeMap::len).sum();
            let replaces = partitions
                .get(partition)
                .is_some_and(|entries| entries.contains_key(&entry.key));
            if !replaces && held >= max {
                return Err(Error::StorageQuota(format!(
                    "{} entries held, limit {}",
                    held, max
                )));
            }
        }

        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn partitions(&self) -> Result<BTreeSet<String>> {
        Ok(self.partitions.read().await.keys().cloned().collect())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        Ok(self.partitions.write().await.remove(partition).is_some())
    }
}

/// File holding the real partition name inside its directory.
const PARTITION_MARKER: &str = "PARTITION";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk entry format.
#[derive(Debug, Serialize, Deserialize)]
struct EntryEnvelope {
    key: String,
    status: u16,
    headers: Headers,
    compression: Compression,
    /// Compressed body, base64 encoded.
    body: String,
    stored_at: DateTime<Utc>,
}

/// Filesystem-backed storage: a directory per partition, a file per entry.
pub struct FilesystemStorage {
    root_dir: PathBuf,
    compression: Compression,
}

impl FilesystemStorage {
    pub fn new(root_dir: PathBuf, compression: Compression) -> Self {
        Self {
            root_dir,
            compression,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn partition_dir(&self, partition: &str) -> Result<PathBuf> {
        validate_partition_name(partition)?;
        Ok(self.root_dir.join(sanitize_key(partition)))
    }

    fn entry_path(&self, partition: &str, key: &str) -> Result<PathBuf> {
        Ok(self.partition_dir(partition)?.join(entry_file_name(key)))
    }

    /// Whether `dir` holds the partition called `partition`.
    async fn owns(dir: &Path, partition: &str) -> bool {
        match tokio::fs::read_to_string(dir.join(PARTITION_MARKER)).await {
            Ok(name) => name == partition,
            Err(_) => false,
        }
    }

    fn encode(&self, entry: &StoredEntry) -> Result<Vec<u8>> {
        let body = compress(&entry.response.body, self.compression)?;
        let envelope = EntryEnvelope {
            key: entry.key.clone(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            compression: self.compression,
            body: BASE64.encode(body),
            stored_at: entry.stored_at,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode(bytes: &[u8]) -> Result<StoredEntry> {
        let envelope: EntryEnvelope = serde_json::from_slice(bytes)?;
        let compressed = BASE64
            .decode(envelope.body)
            .map_err(|e| Error::Storage(format!("Corrupt entry body: {}", e)))?;
        let body = decompress(&compressed, envelope.compression)?;
        Ok(StoredEntry {
            key: envelope.key,
            response: GatewayResponse {
                status: envelope.status,
                headers: envelope.headers,
                body,
            },
            stored_at: envelope.stored_at,
        })
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| storage_error(e, "Failed to write cache entry"))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error(e, "Failed to commit cache entry"));
        }
        Ok(())
    }
}

fn storage_error(err: std::io::Error, context: &str) -> Error {
    match err.kind() {
        std::io::ErrorKind::StorageFull => Error::StorageQuota(format!("{}: {}", context, err)),
        _ => Error::Storage(format!("{}: {}", context, err)),
    }
}

#[async_trait]
impl CacheStorage for FilesystemStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        let dir = self.partition_dir(partition)?;
        let marker = dir.join(PARTITION_MARKER);
        if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error(e, "Failed to create partition dir"))?;
        Self::write_atomic(&marker, partition.as_bytes()).await?;
        debug!(partition, path = %dir.display(), "Created partition");
        Ok(())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<StoredEntry>> {
        let path = self.entry_path(partition, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Self::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e, "Failed to read cache entry")),
        }
    }

    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<()> {
        self.open(partition).await?;
        let contents = self.encode(&entry)?;
        Self::write_atomic(&self.entry_path(partition, &entry.key)?, &contents).await
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        let dir = self.partition_dir(partition)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(vec![]);
        }

        let mut keys = vec![];
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| storage_error(e, "Failed to read partition dir"))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_error(e, "Failed to read entry"))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| storage_error(e, "Failed to read cache entry"))?;
                let envelope: EntryEnvelope = serde_json::from_slice(&bytes)?;
                keys.push(envelope.key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn partitions(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if !tokio::fs::try_exists(&self.root_dir).await.unwrap_or(false) {
            return Ok(names);
        }

        let mut read_dir = tokio::fs::read_dir(&self.root_dir)
            .await
            .map_err(|e| storage_error(e, "Failed to read cache root"))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_error(e, "Failed to read entry"))?
        {
            let marker = entry.path().join(PARTITION_MARKER);
            if let Ok(name) = tokio::fs::read_to_string(&marker).await {
                names.insert(name);
            }
        }

        Ok(names)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        let dir = self.partition_dir(partition)?;
        if !Self::owns(&dir, partition).await {
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(e, "Failed to delete partition")),
        }
    }
}
