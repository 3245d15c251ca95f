//! HTTP request handlers
//!
//! Service-level endpoints. The ceremony endpoints live in [`crate::webauthn::handlers`].

pub mod health;

pub use crate::state::AppState;
pub use health::{health, home, not_found, ready, HealthResponse, ReadyResponse};
