//! Control messages sent by pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized control message, tagged by its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now.
    SkipWaiting,
    /// Ask for the active version tag.
    GetVersion,
}

impl ControlMessage {
    /// Parse a message payload. Anything unrecognized yields `None`.
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Reply to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

/// What handling a control message did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ControlReply {
    /// `SKIP_WAITING` handled; `activated` is false when nothing waited.
    SkipWaiting { activated: bool },
    Version(VersionReply),
    /// Unknown message, dropped.
    Ignored,
}
