//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/openapi.json`.

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, ReadyResponse};
use crate::webauthn::{
    AuthenticationResponse, CeremonyResponseRequest, ErrorResponse, LoginOptionsRequest,
    RegisterOptionsRequest, RegistrationResponse,
};

/// Passgate relying party API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Passgate - WebAuthn Relying Party API",
        version = "0.1.0",
        description = r#"
## Passwordless registration and login

Each ceremony is two calls:

1. `POST /register_options` (or `/login_options`) returns a challenge descriptor.
   Pass its `public_key` member to `navigator.credentials.create()` (or `.get()`).
2. `POST /register_response` (or `/login_response`) with the resulting credential
   as `response_data`.

A user has at most one outstanding challenge; asking for new options supersedes
the previous one. Every challenge is single use and expires after a few minutes.
A failed registration resets the user; a failed login leaves the credential intact.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    tags(
        (name = "Registration", description = "Register a passkey for a user"),
        (name = "Authentication", description = "Log in with a registered passkey"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::webauthn::handlers::register_options,
        crate::webauthn::handlers::register_response,
        crate::webauthn::handlers::login_options,
        crate::webauthn::handlers::login_response,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            RegisterOptionsRequest,
            LoginOptionsRequest,
            CeremonyResponseRequest,
            RegistrationResponse,
            AuthenticationResponse,
            ErrorResponse,
        )
    )
)]
pub struct ApiDoc;
