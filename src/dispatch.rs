//! Device command dispatcher.
//!
//! Translates (device id, desired state, optional duration) into cloud
//! calls. A "turn on for N seconds" arms a deferred off whose abort handle
//! is kept per device, so a manual off cancels the pending timer instead of
//! racing it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;

use crate::cloud::{CloudClient, CloudError, RelayState, SessionStore};

/// Durations must be strictly between zero and 24 hours to arm a deferred
/// off; anything else turns the device on with no timer.
pub const MAX_DURATION_SECS: u64 = 60 * 60 * 24;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("device {0} not found in account device list")]
    DeviceNotFound(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

#[derive(Clone)]
pub struct Dispatcher {
    client: CloudClient,
    store: SessionStore,
    pending: Arc<DashMap<String, tokio::task::AbortHandle>>,
}

impl Dispatcher {
    pub fn new(client: CloudClient, store: SessionStore) -> Self {
        Self {
            client,
            store,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Turn a device on. With a duration in `(0, 86400)` seconds, also arm
    /// a deferred off; re-arming replaces any previous timer for the device.
    pub async fn turn_on(
        &self,
        device_id: &str,
        duration_secs: Option<u64>,
    ) -> Result<(), DispatchError> {
        self.send(device_id, RelayState::On).await?;

        match duration_secs {
            Some(secs) if secs > 0 && secs < MAX_DURATION_SECS => {
                self.arm_deferred_off(device_id, secs);
            }
            Some(secs) => {
                tracing::warn!(device_id, secs, "duration out of range, no deferred off armed");
            }
            None => {}
        }
        Ok(())
    }

    /// Turn a device off, cancelling any pending deferred off first.
    pub async fn turn_off(&self, device_id: &str) -> Result<(), DispatchError> {
        self.cancel_pending(device_id);
        self.send(device_id, RelayState::Off).await
    }

    /// Whether a deferred off is currently armed for the device.
    pub fn pending_off(&self, device_id: &str) -> bool {
        self.pending.contains_key(device_id)
    }

    async fn send(&self, device_id: &str, state: RelayState) -> Result<(), DispatchError> {
        let device = self
            .store
            .find_device(&self.client, device_id)
            .await?
            .ok_or_else(|| DispatchError::DeviceNotFound(device_id.to_string()))?;

        let session = self.store.session(&self.client).await?;
        self.client
            .set_relay_state(&session, &device, state)
            .await?;
        Ok(())
    }

    fn arm_deferred_off(&self, device_id: &str, secs: u64) {
        // Replace any timer already armed for this device.
        self.cancel_pending(device_id);

        tracing::info!(device_id, secs, "arming deferred off");
        let this = self.clone();
        let id = device_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            this.pending.remove(&id);
            tracing::info!(device_id = %id, "deferred off firing");
            if let Err(e) = this.send(&id, RelayState::Off).await {
                tracing::error!(device_id = %id, "deferred off failed: {e}");
            }
        });
        self.pending
            .insert(device_id.to_string(), handle.abort_handle());
    }

    fn cancel_pending(&self, device_id: &str) {
        if let Some((_, handle)) = self.pending.remove(device_id) {
            tracing::info!(device_id, "cancelling pending deferred off");
            handle.abort();
        }
    }
}
