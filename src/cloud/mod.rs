pub mod client;
pub mod session;
pub mod types;

pub use client::{CloudClient, CloudError, Session, SESSION_TTL};
pub use session::SessionStore;
pub use types::{DeviceRecord, RelayState};
