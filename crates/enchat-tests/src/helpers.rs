//! Serving a gateway and talking to it the way a page does.

use enchat_gateway::{AppState, Gateway, create_router};
use reqwest::{Client, RequestBuilder, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve a gateway on a random local port.
pub async fn start_test_server(gateway: Arc<Gateway>) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(Arc::new(AppState::new(gateway)));

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Test server failed");
        }
    });
    Ok((addr, handle))
}

/// A page behind the gateway. Requests optionally carry the page's
/// client id.
pub struct PageClient {
    http: Client,
    origin: String,
    client_id: Option<String>,
}

impl PageClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            origin: format!("http://{}", addr),
            client_id: None,
        }
    }

    /// The same gateway, seen from the page `id`.
    pub fn as_page(&self, id: &str) -> Self {
        Self {
            http: self.http.clone(),
            origin: self.origin.clone(),
            client_id: Some(id.to_string()),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.client_id {
            Some(id) => builder.header("x-enchat-client", id),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.request(self.http.get(self.url(path))).send().await
    }

    /// GET as a document navigation.
    pub async fn navigate(&self, path: &str) -> reqwest::Result<Response> {
        self.request(self.http.get(self.url(path)))
            .header("accept", "text/html,application/xhtml+xml")
            .send()
            .await
    }

    pub async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Result<Response> {
        self.request(self.http.post(self.url(path))).json(body).send().await
    }

    pub async fn post_raw(&self, path: &str, body: Vec<u8>) -> reqwest::Result<Response> {
        self.request(self.http.post(self.url(path))).body(body).send().await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<Response> {
        self.request(self.http.delete(self.url(path))).send().await
    }

    /// Partition names the gateway currently holds.
    pub async fn partitions(&self) -> anyhow::Result<Vec<String>> {
        let body: serde_json::Value = self.get("/__enchat/partitions").await?.json().await?;
        Ok(serde_json::from_value(body["partitions"].clone())?)
    }
}
