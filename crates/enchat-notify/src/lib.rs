//! Push notification presentation for the EnChat gateway.
//!
//! Turns an inbound push payload into a notification with "open" and
//! "dismiss" actions and hands it to a presenter: the log, or a webhook
//! that relays it to the pages.

pub mod notification;
pub mod presenter;

pub use notification::{NotificationAction, NotificationData, PushNotification};
pub use presenter::{
    LogPresenter, NotificationPresenter, NotifyError, WebhookPresenter, create_presenter,
};
