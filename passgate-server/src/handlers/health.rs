//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::Uri, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::webauthn::ErrorResponse;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Credential storage status: "persistent", "memory" or "unavailable"
    #[schema(example = "persistent")]
    pub storage: &'static str,
}

/// GET /health - Health check endpoint
///
/// Reports "degraded" when the credential store cannot be reached.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.rp.store();

    let (status, storage) = match store.check_health().await {
        Ok(()) if store.is_persistent() => ("healthy", "persistent"),
        Ok(()) => ("healthy", "memory"),
        Err(e) => {
            tracing::warn!(error = %e, "Credential store health check failed");
            ("degraded", "unavailable")
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "passgate-server",
        storage,
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Returns 200 once the credential store answers, 503 otherwise.
/// Unlike /health, this is a simple yes/no check.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Readiness", body = ReadyResponse),
        (status = 503, description = "Credential store unreachable", body = ErrorResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    if let Err(e) = state.rp.store().check_health().await {
        tracing::warn!(error = %e, "Readiness check failed");
        return Err(ApiError::service_unavailable("Credential storage unreachable"));
    }

    Ok(Json(ReadyResponse {
        ready: true,
        message: None,
    }))
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

/// GET / - Welcome text
pub async fn home() -> &'static str {
    "Welcome to the WebAuthn API!"
}
