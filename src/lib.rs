//! kasalink — IFTTT service shim for TP-Link Kasa smart plugs.
//!
//! Library crate so integration tests in `tests/` can build the router
//! and drive the cloud client against a mock vendor endpoint.

use std::sync::Arc;

pub mod api;
pub mod cloud;
pub mod config;
pub mod dispatch;
pub mod errors;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: config::Config,
    pub client: cloud::CloudClient,
    pub store: cloud::SessionStore,
    pub dispatcher: dispatch::Dispatcher,
}

impl AppState {
    pub fn new(config: config::Config) -> Arc<Self> {
        let client = cloud::CloudClient::new(&config.cloud_url, &config.username, &config.password);
        let store = cloud::SessionStore::new();
        let dispatcher = dispatch::Dispatcher::new(client.clone(), store.clone());
        Arc::new(Self {
            config,
            client,
            store,
            dispatcher,
        })
    }
}
