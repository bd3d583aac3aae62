//! HTTP client for a running gateway's control routes.

use crate::config::CliConfig;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("No active gateway version")]
    NoActiveVersion,
    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },
}

#[derive(Debug, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct PartitionList {
    pub partitions: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SyncSummary {
    pub replayed: usize,
    pub failed: usize,
    pub remaining: usize,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &CliConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/__enchat{}", self.base_url, path);
        self.client.request(method, url)
    }

    async fn check(res: Response) -> Result<Response, ApiError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let message = res.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
            StatusCode::SERVICE_UNAVAILABLE => Err(ApiError::NoActiveVersion),
            _ => Err(ApiError::Server { status, message }),
        }
    }

    async fn send_message(&self, message_type: &str) -> Result<Response, ApiError> {
        let res = self
            .request(Method::POST, "/message")
            .json(&json!({ "type": message_type }))
            .send()
            .await?;
        Self::check(res).await
    }

    pub async fn version(&self) -> Result<String, ApiError> {
        let reply: VersionReply = self.send_message("GET_VERSION").await?.json().await?;
        Ok(reply.version)
    }

    pub async fn skip_waiting(&self) -> Result<(), ApiError> {
        self.send_message("SKIP_WAITING").await?;
        Ok(())
    }

    pub async fn install(&self, version: &str) -> Result<Value, ApiError> {
        let res = self
            .request(Method::POST, "/install")
            .json(&json!({ "version": version }))
            .send()
            .await?;
        Ok(Self::check(res).await?.json().await?)
    }

    /// `None` when the gateway does not handle `tag`.
    pub async fn sync(&self, tag: &str) -> Result<Option<SyncSummary>, ApiError> {
        let res = self
            .request(Method::POST, &format!("/sync/{}", tag))
            .send()
            .await?;
        let res = Self::check(res).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(res.json().await?))
    }

    pub async fn list_partitions(&self) -> Result<PartitionList, ApiError> {
        let res = self.request(Method::GET, "/partitions").send().await?;
        Ok(Self::check(res).await?.json().await?)
    }

    pub async fn delete_partition(&self, name: &str) -> Result<(), ApiError> {
        let res = self
            .request(Method::DELETE, &format!("/partitions/{}", name))
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}
