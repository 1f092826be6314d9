use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::cloud::CloudError;
use crate::dispatch::DispatchError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("service key is not correct")]
    ServiceKeyInvalid,

    #[error("missing action field: {0}")]
    MissingActionField(&'static str),

    #[error("no devices found")]
    NoDevices,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::DeviceNotFound(id) => AppError::DeviceNotFound(id),
            DispatchError::Cloud(e) => AppError::Cloud(e),
        }
    }
}

/// IFTTT expects every error body to be `{"errors":[{"message": ...}]}`;
/// action validation errors additionally carry `"status":"SKIP"` so the
/// applet run is skipped instead of retried.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::ServiceKeyInvalid => (
                StatusCode::UNAUTHORIZED,
                json!({ "errors": [{ "message": "Channel/Service key is not correct" }] }),
            ),
            AppError::MissingActionField(field) => (
                StatusCode::BAD_REQUEST,
                json!({ "errors": [{ "status": "SKIP", "message": format!("{field} not supplied") }] }),
            ),
            AppError::NoDevices => (
                StatusCode::UNAUTHORIZED,
                json!({ "errors": [{ "message": "no devices found" }] }),
            ),
            AppError::DeviceNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "errors": [{ "message": format!("device {id} not found") }] }),
            ),
            AppError::Cloud(e) => {
                tracing::error!("cloud error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "errors": [{ "message": "vendor cloud request failed" }] }),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "errors": [{ "message": "internal server error" }] }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
