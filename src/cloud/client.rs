//! HTTP client for the Kasa cloud endpoint.
//!
//! Every operation returns a typed [`CloudError`] instead of logging and
//! swallowing failures; callers decide what to surface.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use super::types::{
    CloudResponse, DeviceListRequest, DeviceListResult, DeviceRecord, LoginRequest, LoginResult,
    PassthroughRequest, RelayState,
};

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("cloud transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cloud returned HTTP {0}")]
    Status(StatusCode),

    #[error("cloud API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("login response did not contain a token")]
    MissingToken,

    #[error("device {0} has no command endpoint")]
    InvalidDeviceUrl(String),
}

/// An authenticated cloud session. The terminal UUID is the per-login nonce
/// the vendor requires; it is regenerated on every login and carried along
/// with the token for the session's lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub terminal_uuid: Uuid,
    pub issued_at: Instant,
}

/// Tokens older than this are renewed before use.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

impl Session {
    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() >= SESSION_TTL
    }
}

#[derive(Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl CloudClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Perform the vendor login handshake and return a fresh session.
    pub async fn login(&self) -> Result<Session, CloudError> {
        let terminal_uuid = Uuid::new_v4();
        let req = LoginRequest::new(&self.username, &self.password, terminal_uuid);

        let resp = self.http.post(&self.base_url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(CloudError::Status(resp.status()));
        }

        let body: CloudResponse<LoginResult> = resp.json().await?;
        if body.error_code != 0 {
            return Err(CloudError::Api {
                code: body.error_code,
                msg: body.msg.unwrap_or_default(),
            });
        }

        let token = body
            .result
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty())
            .ok_or(CloudError::MissingToken)?;

        tracing::debug!(%terminal_uuid, "cloud login succeeded");
        Ok(Session {
            token,
            terminal_uuid,
            issued_at: Instant::now(),
        })
    }

    /// Fetch the account's device inventory. An empty or missing list is a
    /// valid (empty) result, not an error.
    pub async fn fetch_device_list(
        &self,
        session: &Session,
    ) -> Result<Vec<DeviceRecord>, CloudError> {
        let req = DeviceListRequest::new(&session.token, session.terminal_uuid);

        let resp = self.http.post(&self.base_url).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(CloudError::Status(resp.status()));
        }

        let body: CloudResponse<DeviceListResult> = resp.json().await?;
        if body.error_code != 0 {
            return Err(CloudError::Api {
                code: body.error_code,
                msg: body.msg.unwrap_or_default(),
            });
        }

        let devices = body
            .result
            .and_then(|r| r.device_list)
            .unwrap_or_default();
        tracing::debug!(count = devices.len(), "fetched device list");
        Ok(devices)
    }

    /// Send a relay-state command to one device via its passthrough endpoint.
    pub async fn set_relay_state(
        &self,
        session: &Session,
        device: &DeviceRecord,
        state: RelayState,
    ) -> Result<(), CloudError> {
        if device.app_server_url.is_empty() {
            return Err(CloudError::InvalidDeviceUrl(device.device_id.clone()));
        }

        let req = PassthroughRequest::set_relay_state(
            &session.token,
            session.terminal_uuid,
            &device.device_id,
            state,
        );

        let resp = self
            .http
            .post(&device.app_server_url)
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CloudError::Status(resp.status()));
        }

        let body: CloudResponse<serde_json::Value> = resp.json().await?;
        if body.error_code != 0 {
            return Err(CloudError::Api {
                code: body.error_code,
                msg: body.msg.unwrap_or_default(),
            });
        }

        tracing::info!(device_id = %device.device_id, state = state.wire_value(), "relay command sent");
        Ok(())
    }
}
