//! Wire model for the Kasa cloud JSON-RPC-ish protocol.
//!
//! Every call is a POST of `{method, params}`; responses carry `error_code`
//! (0 on success) plus an optional `msg` and a method-specific `result`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The application tag the vendor expects on every request.
pub const APP_TYPE: &str = "Kasa_Android";

/// Desired relay state of a plug. The vendor wire format is 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    pub fn wire_value(self) -> u8 {
        match self {
            RelayState::Off => 0,
            RelayState::On => 1,
        }
    }
}

// ── Requests ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub method: &'static str,
    pub params: LoginParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams<'a> {
    pub app_type: &'static str,
    pub cloud_user_name: &'a str,
    pub cloud_password: &'a str,
    #[serde(rename = "terminalUUID")]
    pub terminal_uuid: Uuid,
}

impl<'a> LoginRequest<'a> {
    pub fn new(username: &'a str, password: &'a str, terminal_uuid: Uuid) -> Self {
        Self {
            method: "login",
            params: LoginParams {
                app_type: APP_TYPE,
                cloud_user_name: username,
                cloud_password: password,
                terminal_uuid,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeviceListRequest<'a> {
    pub method: &'static str,
    pub params: TokenParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenParams<'a> {
    pub app_type: &'static str,
    pub token: &'a str,
    #[serde(rename = "terminalUUID")]
    pub terminal_uuid: Uuid,
}

impl<'a> DeviceListRequest<'a> {
    pub fn new(token: &'a str, terminal_uuid: Uuid) -> Self {
        Self {
            method: "getDeviceList",
            params: TokenParams {
                app_type: APP_TYPE,
                token,
                terminal_uuid,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PassthroughRequest<'a> {
    pub method: &'static str,
    pub params: PassthroughParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassthroughParams<'a> {
    pub app_type: &'static str,
    pub token: &'a str,
    #[serde(rename = "terminalUUID")]
    pub terminal_uuid: Uuid,
    pub device_id: &'a str,
    pub request_data: serde_json::Value,
}

impl<'a> PassthroughRequest<'a> {
    pub fn set_relay_state(
        token: &'a str,
        terminal_uuid: Uuid,
        device_id: &'a str,
        state: RelayState,
    ) -> Self {
        Self {
            method: "passthrough",
            params: PassthroughParams {
                app_type: APP_TYPE,
                token,
                terminal_uuid,
                device_id,
                request_data: serde_json::json!({
                    "system": { "set_relay_state": { "state": state.wire_value() } }
                }),
            },
        }
    }
}

// ── Responses ────────────────────────────────────────────────

/// Envelope shared by every cloud response. `error_code` 0 means success;
/// some endpoints omit it entirely on success.
#[derive(Debug, Deserialize)]
pub struct CloudResponse<T> {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct LoginResult {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResult {
    #[serde(default)]
    pub device_list: Option<Vec<DeviceRecord>>,
}

/// One controllable device as reported by `getDeviceList`. Immutable
/// snapshot; the cache never refreshes it within a process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(default)]
    pub alias: String,
    /// Per-device command endpoint returned by the login-scoped listing.
    #[serde(default)]
    pub app_server_url: String,
    #[serde(default)]
    pub device_type: String,
    /// 1 when the vendor believes the device is reachable.
    #[serde(default)]
    pub status: i32,
}

impl DeviceRecord {
    /// Human-readable alias. The Tapo product line reports aliases
    /// base64-encoded; older Kasa plugs report them as plain text.
    /// Falls back to the raw field when decoding fails.
    pub fn display_alias(&self) -> String {
        if !self.device_type.starts_with("SMART.TAPO") {
            return self.alias.clone();
        }
        base64::engine::general_purpose::STANDARD
            .decode(&self.alias)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| self.alias.clone())
    }
}
