//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use passgate_core::RelyingParty;

/// Application state containing shared resources.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Ceremony state machine bound to the configured store and backend
    pub rp: Arc<RelyingParty>,
}

impl AppState {
    pub fn new(rp: RelyingParty) -> Self {
        Self { rp: Arc::new(rp) }
    }
}
