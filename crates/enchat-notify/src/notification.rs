//! Notification payloads.

use chrono::{DateTime, Utc};
use enchat_core::config::PushConfig;
use serde::{Deserialize, Serialize};

/// Actions offered on a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// Focus or open the application's root page.
    Open,
    /// Close the notification. No other effect.
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionButton {
    pub action: NotificationAction,
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub date_of_arrival: DateTime<Utc>,
    pub primary_key: u32,
}

/// A notification ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<ActionButton>,
}

impl PushNotification {
    /// Build the notification for a push. An empty or missing payload
    /// falls back to the configured placeholder body.
    pub fn from_push(payload: Option<&[u8]>, config: &PushConfig) -> Self {
        let body = payload
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_else(|| config.default_body.clone());

        Self {
            title: config.title.clone(),
            body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                date_of_arrival: Utc::now(),
                primary_key: 1,
            },
            actions: vec![
                ActionButton {
                    action: NotificationAction::Open,
                    title: config.open_title.clone(),
                    icon: config.icon.clone(),
                },
                ActionButton {
                    action: NotificationAction::Dismiss,
                    title: config.dismiss_title.clone(),
                    icon: config.icon.clone(),
                },
            ],
        }
    }
}
