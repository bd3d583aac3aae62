//! Notification presenters.

use crate::notification::PushNotification;
use async_trait::async_trait;
use enchat_core::config::PushConfig;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

impl From<NotifyError> for enchat_core::Error {
    fn from(err: NotifyError) -> Self {
        enchat_core::Error::Notification(err.to_string())
    }
}

/// Trait for notification presenters.
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    async fn show(&self, notification: &PushNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogPresenter;

#[async_trait]
impl NotificationPresenter for LogPresenter {
    async fn show(&self, notification: &PushNotification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            body = %notification.body,
            actions = notification.actions.len(),
            "Push notification"
        );
        Ok(())
    }
}

/// Relays notifications as JSON to a webhook.
pub struct WebhookPresenter {
    url: String,
    client: reqwest::Client,
}

impl WebhookPresenter {
    pub fn new(url: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_seconds))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NotificationPresenter for WebhookPresenter {
    async fn show(&self, notification: &PushNotification) -> Result<(), NotifyError> {
        debug!(url = %self.url, "Sending push notification to webhook");

        let response = self.client.post(&self.url).json(notification).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::DeliveryFailed(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!("Push notification delivered");
        Ok(())
    }
}

/// Create the presenter selected by the push configuration.
pub fn create_presenter(config: &PushConfig) -> Box<dyn NotificationPresenter> {
    match &config.webhook_url {
        Some(url) => Box::new(WebhookPresenter::new(url.clone(), config.webhook_timeout_secs)),
        None => Box::new(LogPresenter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_log_presenter() {
        let n = PushNotification::from_push(None, &PushConfig::default());
        LogPresenter.show(&n).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_presenter_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_partial_json(serde_json::json!({"title": "EnChat", "body": "hello"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let presenter = WebhookPresenter::new(format!("{}/notify", server.uri()), 5);
        let n = PushNotification::from_push(Some(b"hello"), &PushConfig::default());
        presenter.show(&n).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_presenter_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let presenter = WebhookPresenter::new(server.uri(), 5);
        let n = PushNotification::from_push(None, &PushConfig::default());
        let err = presenter.show(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::DeliveryFailed(_)));
    }

    #[test]
    fn test_create_presenter_defaults_to_log() {
        let _presenter = create_presenter(&PushConfig::default());
        let config = PushConfig {
            webhook_url: Some("http://localhost:1/notify".into()),
            ..PushConfig::default()
        };
        let _webhook = create_presenter(&config);
    }
}
