//! Gateway configuration.
//!
//! One `GatewayConfig` is built at startup and handed to every component;
//! a version upgrade installs a copy carrying the new version tag.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Build identifier that namespaces the cache partitions.
    #[serde(default = "default_version")]
    pub version: String,
    /// Fixed prefix of every partition name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Public origin pages use to reach the gateway. Cache keys are
    /// absolute URLs on this origin.
    #[serde(default = "default_origin")]
    pub origin: Url,
    /// Origin server that live fetches are sent to.
    #[serde(default = "default_upstream")]
    pub upstream: Url,
    /// Socket address the HTTP surface binds.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Path prefix reserved for backend calls.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Path suffixes that mark a static asset.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,
    /// Assets stored in the static partition at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
    /// Document served when a navigation fails offline.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,
    /// Activate right after install instead of waiting.
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting: bool,
    /// Per-request upstream timeout. `None` waits indefinitely.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: Option<u64>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_version() -> String {
    "v1.0.0".to_string()
}

fn default_cache_prefix() -> String {
    "enchat".to_string()
}

fn default_origin() -> Url {
    Url::parse("http://localhost:8080").expect("static URL")
}

fn default_upstream() -> Url {
    Url::parse("http://localhost:3000").expect("static URL")
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_static_extensions() -> Vec<String> {
    [
        ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".ico", ".svg", ".woff",
        ".woff2", ".ttf", ".eot",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/static/style.css",
        "/static/favicon.ico",
        "/src/app.js",
        "/src/services/ChatService.js",
        "/src/services/AuthService.js",
        "/src/utils/ThemeManager.js",
        "/src/utils/SoundManager.js",
        "/src/utils/AnimationManager.js",
        "/src/utils/ToastManager.js",
        "/styles/main.css",
        "/styles/chat.css",
        "/styles/loading.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_document() -> String {
    "/index.html".to_string()
}

fn default_skip_waiting() -> bool {
    true
}

fn default_upstream_timeout() -> Option<u64> {
    Some(30)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            upstream: default_upstream(),
            listen_addr: default_listen_addr(),
            api_prefix: default_api_prefix(),
            static_extensions: default_static_extensions(),
            precache: default_precache(),
            offline_document: default_offline_document(),
            skip_waiting: default_skip_waiting(),
            upstream_timeout_secs: default_upstream_timeout(),
            storage: StorageConfig::default(),
            push: PushConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::InvalidConfig("version tag must not be empty".into()));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(Error::InvalidConfig("cache_prefix must not be empty".into()));
        }
        if !self.api_prefix.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "api_prefix must start with '/': {}",
                self.api_prefix
            )));
        }
        for url in [&self.origin, &self.upstream] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::InvalidConfig(format!("not an http(s) URL: {}", url)));
            }
        }
        for path in self.precache.iter().chain([&self.offline_document]) {
            if !path.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "asset paths must be absolute: {}",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Copy of this configuration carrying another version tag.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }
}

/// Cache storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the filesystem backend.
    #[serde(default = "default_storage_root")]
    pub root_dir: PathBuf,
    /// Compression applied to stored bodies.
    #[serde(default)]
    pub compression: Compression,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("/var/lib/enchat/cache")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root_dir: default_storage_root(),
            compression: Compression::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

/// Compression algorithm for stored response bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Zstd,
    Gzip,
}

/// Push notification presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_push_title")]
    pub title: String,
    /// Body used when a push carries no payload.
    #[serde(default = "default_push_body")]
    pub default_body: String,
    #[serde(default = "default_push_icon")]
    pub icon: String,
    #[serde(default = "default_push_icon")]
    pub badge: String,
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
    #[serde(default = "default_open_title")]
    pub open_title: String,
    #[serde(default = "default_dismiss_title")]
    pub dismiss_title: String,
    /// Page focused or opened by the "open" action.
    #[serde(default = "default_open_url")]
    pub open_url: String,
    /// Deliver notifications to this webhook instead of the log.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_push_title() -> String {
    "EnChat".to_string()
}

fn default_push_body() -> String {
    "Bạn có tin nhắn mới từ EnChat!".to_string()
}

fn default_push_icon() -> String {
    "/static/icon-192.png".to_string()
}

fn default_vibrate() -> Vec<u32> {
    vec![100, 50, 100]
}

fn default_open_title() -> String {
    "Xem".to_string()
}

fn default_dismiss_title() -> String {
    "Đóng".to_string()
}

fn default_open_url() -> String {
    "/".to_string()
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            title: default_push_title(),
            default_body: default_push_body(),
            icon: default_push_icon(),
            badge: default_push_icon(),
            vibrate: default_vibrate(),
            open_title: default_open_title(),
            dismiss_title: default_dismiss_title(),
            open_url: default_open_url(),
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

/// Background sync replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tag the replay hook is registered under.
    #[serde(default = "default_sync_tag")]
    pub tag: String,
    /// JSON file holding the queue. In-memory when unset.
    #[serde(default)]
    pub queue_path: Option<PathBuf>,
}

fn default_sync_tag() -> String {
    "background-sync".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: default_sync_tag(),
            queue_path: None,
        }
    }
}
