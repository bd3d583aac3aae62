//! Partition and entry types.

use chrono::{DateTime, Utc};
use enchat_core::{GatewayConfig, GatewayResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::partition_name;

/// The two partitions every version owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Filled once at install time from the precache list.
    Static,
    /// Filled lazily from live responses.
    Dynamic,
}

impl PartitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKind::Static => "static",
            PartitionKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition names owned by one version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    pub version: String,
    pub static_name: String,
    pub dynamic_name: String,
}

impl PartitionSet {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            version: version.to_string(),
            static_name: partition_name(prefix, PartitionKind::Static, version),
            dynamic_name: partition_name(prefix, PartitionKind::Dynamic, version),
        }
    }

    pub fn for_config(config: &GatewayConfig) -> Self {
        Self::new(&config.cache_prefix, &config.version)
    }

    pub fn name(&self, kind: PartitionKind) -> &str {
        match kind {
            PartitionKind::Static => &self.static_name,
            PartitionKind::Dynamic => &self.dynamic_name,
        }
    }

    /// Read order for cache-first lookups: dynamic, then static.
    pub fn lookup_order(&self) -> [&str; 2] {
        [&self.dynamic_name, &self.static_name]
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.static_name || name == self.dynamic_name
    }
}

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Request identity (`METHOD URL`).
    pub key: String,
    pub response: GatewayResponse,
    pub stored_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(key: impl Into<String>, response: GatewayResponse) -> Self {
        Self {
            key: key.into(),
            response,
            stored_at: Utc::now(),
        }
    }
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    /// Partition the entry was found in.
    pub partition: String,
    pub response: GatewayResponse,
}
