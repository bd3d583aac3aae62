//! Request handlers organized by resource.

pub mod control;
pub mod fetch;
pub mod health;
pub mod notifications;
pub mod partitions;
pub mod sync;

use axum::http::StatusCode;
use enchat_core::Error;

/// Map a gateway error onto the status a control route answers with.
pub(crate) fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NoActiveInstance => StatusCode::SERVICE_UNAVAILABLE,
        Error::InvalidRequest(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        Error::PartitionNotFound(_) | Error::ActionNotFound(_) => StatusCode::NOT_FOUND,
        Error::InstallFailed { .. } | Error::Network(_) | Error::Timeout { .. } => {
            StatusCode::BAD_GATEWAY
        }
        Error::StorageQuota(_) => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
