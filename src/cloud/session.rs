//! Session and device-list cache.
//!
//! One `SessionStore` is owned by the application state and shared by
//! handle. A single async mutex guards both cached values, so concurrent
//! first calls serialize on one login instead of racing to authenticate.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::client::{CloudClient, CloudError, Session};
use super::types::DeviceRecord;

#[derive(Default)]
struct Cached {
    session: Option<Session>,
    devices: Option<Arc<Vec<DeviceRecord>>>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<Cached>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a usable session, logging in when none is cached or the
    /// cached one has aged past its TTL. The token is reused across
    /// device-list fetches and commands until it expires.
    pub async fn session(&self, client: &CloudClient) -> Result<Session, CloudError> {
        let mut cached = self.inner.lock().await;
        if let Some(session) = cached.session.as_ref() {
            if !session.is_expired() {
                return Ok(session.clone());
            }
            tracing::debug!("cached session expired, renewing");
        }
        let session = client.login().await?;
        cached.session = Some(session.clone());
        Ok(session)
    }

    /// Return the cached device list, fetching it on first use. A populated
    /// cache is served without any network call and lives for the process
    /// lifetime; empty results are not cached so a later call can retry.
    pub async fn devices(
        &self,
        client: &CloudClient,
    ) -> Result<Arc<Vec<DeviceRecord>>, CloudError> {
        {
            let cached = self.inner.lock().await;
            if let Some(devices) = cached.devices.as_ref() {
                tracing::debug!(count = devices.len(), "device cache hit");
                return Ok(devices.clone());
            }
        }

        // Not cached. Re-take the lock across the fetch so concurrent first
        // calls produce one login + one listing, not several.
        let mut cached = self.inner.lock().await;
        if let Some(devices) = cached.devices.as_ref() {
            return Ok(devices.clone());
        }

        let session = match cached.session.as_ref() {
            Some(s) if !s.is_expired() => s.clone(),
            _ => {
                let session = client.login().await?;
                cached.session = Some(session.clone());
                session
            }
        };

        let devices = Arc::new(client.fetch_device_list(&session).await?);
        if !devices.is_empty() {
            cached.devices = Some(devices.clone());
        }
        Ok(devices)
    }

    /// Find one device by id in the cached (or freshly fetched) list.
    pub async fn find_device(
        &self,
        client: &CloudClient,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, CloudError> {
        let devices = self.devices(client).await?;
        Ok(devices.iter().find(|d| d.device_id == device_id).cloned())
    }

    /// Replace the cached session wholesale, e.g. to exercise expiry
    /// handling with a backdated session.
    pub async fn put_session(&self, session: Session) {
        self.inner.lock().await.session = Some(session);
    }

    /// Drop both caches. The next call logs in and re-lists from scratch.
    pub async fn invalidate(&self) {
        let mut cached = self.inner.lock().await;
        cached.session = None;
        cached.devices = None;
    }
}
