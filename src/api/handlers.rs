use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct QueryRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionRequest {
    pub action_fields: Option<ActionFields>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ActionFields {
    pub device_name: Option<String>,
    /// IFTTT delivers numeric fields as JSON strings; accept either.
    pub duration: Option<serde_json::Value>,
}

impl ActionFields {
    fn duration_secs(&self) -> Option<u64> {
        match self.duration.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeviceName {
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

#[derive(Debug, Serialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET / — unauthenticated service banner.
pub async fn banner() -> &'static str {
    "kasalink: service shim for linking TP-Link Kasa to IFTTT"
}

/// GET /ifttt/v1/status — key-gated liveness check required by IFTTT.
pub async fn status() -> StatusCode {
    StatusCode::OK
}

/// POST /ifttt/v1/test/setup — sample action payloads for the IFTTT
/// endpoint test harness.
pub async fn test_setup() -> Json<serde_json::Value> {
    Json(json!({
        "data": {
            "samples": {
                "actions": {
                    "turn_device_on": { "device_name": "test device", "duration": 5 },
                    "turn_device_off": { "device_name": "test device" },
                }
            }
        }
    }))
}

/// POST /ifttt/v1/queries/list_all_devices
pub async fn list_all_devices(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let devices = state.store.devices(&state.client).await?;
    if devices.is_empty() {
        return Err(AppError::NoDevices);
    }

    let mut data: Vec<DeviceName> = devices
        .iter()
        .map(|d| DeviceName {
            device_name: d.display_alias(),
        })
        .collect();

    // TODO: opaque cursors; for now the cursor is the index of the next item.
    let mut cursor = None;
    if let Some(limit) = req.limit {
        if limit < data.len() {
            cursor = Some(limit.to_string());
        }
        data.truncate(limit);
    }

    Ok(Json(json!({ "data": data, "cursor": cursor })))
}

/// POST /ifttt/v1/actions/turn_device_{on,off}/fields/device_name/options —
/// dropdown options for the IFTTT applet editor.
pub async fn device_options(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let devices = state.store.devices(&state.client).await?;
    if devices.is_empty() {
        return Err(AppError::NoDevices);
    }

    let data: Vec<FieldOption> = devices
        .iter()
        .map(|d| FieldOption {
            label: d.display_alias(),
            value: d.device_id.clone(),
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}

/// POST /ifttt/v1/actions/turn_device_on
pub async fn turn_device_on(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let fields = req.action_fields.unwrap_or_default();
    let device_id = fields
        .device_name
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(AppError::MissingActionField("device name"))?;
    let duration = fields.duration_secs();

    tracing::info!(%device_id, ?duration, "action: turn_device_on");

    if state.config.strict_errors {
        state.dispatcher.turn_on(&device_id, duration).await?;
    } else {
        let dispatcher = state.dispatcher.clone();
        let id = device_id.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.turn_on(&id, duration).await {
                tracing::error!(device_id = %id, "turn_device_on failed: {e}");
            }
        });
    }

    Ok(Json(json!({ "data": [{ "id": device_id }] })))
}

/// POST /ifttt/v1/actions/turn_device_off
pub async fn turn_device_off(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let fields = req.action_fields.unwrap_or_default();
    let device_id = fields
        .device_name
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(AppError::MissingActionField("device name"))?;

    tracing::info!(%device_id, "action: turn_device_off");

    if state.config.strict_errors {
        state.dispatcher.turn_off(&device_id).await?;
    } else {
        let dispatcher = state.dispatcher.clone();
        let id = device_id.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.turn_off(&id).await {
                tracing::error!(device_id = %id, "turn_device_off failed: {e}");
            }
        });
    }

    Ok(Json(json!({ "data": [{ "id": device_id }] })))
}
