//! Tab-scoped session tracking.
//!
//! - [`types`]: the persisted `Session` record
//! - [`manager`]: expiry, duplicate suppression and collector reconciliation

mod manager;
mod types;

pub use manager::{payload_hash, AcceptedEvent, Admission, SessionManager};
pub use types::Session;
