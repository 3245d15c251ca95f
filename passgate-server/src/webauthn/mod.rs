//! WebAuthn relying party surface of the server
//!
//! ## Architecture
//!
//! - `backend`: `webauthn-rs` implementation of the verification contract
//! - `handlers`: HTTP endpoint handlers for registration/authentication
//! - `storage`: SQL credential stores (PostgreSQL, SQLite) and store selection
//! - `types`: Request/response types for the ceremony API

mod backend;
pub mod handlers;
pub mod storage;
mod types;

pub use backend::{user_handle, WebauthnRsBackend};
pub use handlers::{login_options, login_response, register_options, register_response};
pub use storage::{PostgresCredentialStore, SqliteCredentialStore};
pub use types::{
    AuthenticationResponse, CeremonyResponseRequest, ErrorResponse, LoginOptionsRequest,
    RegisterOptionsRequest, RegistrationResponse,
};
