//! Ceremony HTTP endpoint handlers
//!
//! Thin adapters between JSON bodies and the [`RelyingParty`] operations.
//! Every decision about state lives in `passgate-core`.
//!
//! [`RelyingParty`]: passgate_core::RelyingParty

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use passgate_core::{ChallengeDescriptor, ClientResponse};

use super::types::{
    AuthenticationResponse, CeremonyResponseRequest, ErrorResponse, LoginOptionsRequest,
    RegisterOptionsRequest, RegistrationResponse,
};
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{validate_user_id, validate_user_name};

/// POST /register_options
///
/// Issue a registration challenge. Any challenge still outstanding for the
/// user is superseded.
#[utoipa::path(
    post,
    path = "/register_options",
    tag = "Registration",
    request_body = RegisterOptionsRequest,
    responses(
        (status = 200, description = "Challenge descriptor; `public_key` goes to navigator.credentials.create()"),
        (status = 400, description = "Missing or invalid user_id / user_name", body = ErrorResponse),
        (status = 409, description = "User already holds a credential", body = ErrorResponse),
        (status = 503, description = "Credential storage unavailable", body = ErrorResponse)
    )
)]
pub async fn register_options(
    State(state): State<AppState>,
    body: Result<Json<RegisterOptionsRequest>, JsonRejection>,
) -> Result<Json<ChallengeDescriptor>, ApiError> {
    let Json(req) = body.map_err(reject)?;
    let user_id = validate_user_id(req.user_id.as_deref())?;
    let user_name = validate_user_name(req.user_name.as_deref())?;

    let descriptor = state.rp.begin_registration(user_id, user_name).await?;
    Ok(Json(descriptor))
}

/// POST /register_response
///
/// Verify the attestation produced for the outstanding registration challenge.
#[utoipa::path(
    post,
    path = "/register_response",
    tag = "Registration",
    request_body = CeremonyResponseRequest,
    responses(
        (status = 200, description = "Credential registered", body = RegistrationResponse),
        (status = 400, description = "Missing user_id or response_data", body = ErrorResponse),
        (status = 401, description = "Attestation rejected; registration must restart", body = ErrorResponse),
        (status = 409, description = "No registration in progress", body = ErrorResponse),
        (status = 503, description = "Credential storage unavailable", body = ErrorResponse)
    )
)]
pub async fn register_response(
    State(state): State<AppState>,
    body: Result<Json<CeremonyResponseRequest>, JsonRejection>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let Json(req) = body.map_err(reject)?;
    let user_id = validate_user_id(req.user_id.as_deref())?;
    let response = client_response(req.response_data)?;

    let credential = state.rp.complete_registration(user_id, &response).await?;

    Ok(Json(RegistrationResponse {
        status: "success",
        message: "Registration successful!",
        credential_id: credential.credential_id.encode(),
    }))
}

/// POST /login_options
///
/// Issue an authentication challenge for a registered user.
#[utoipa::path(
    post,
    path = "/login_options",
    tag = "Authentication",
    request_body = LoginOptionsRequest,
    responses(
        (status = 200, description = "Challenge descriptor; `public_key` goes to navigator.credentials.get()"),
        (status = 400, description = "Missing user_id", body = ErrorResponse),
        (status = 404, description = "User not found or not registered", body = ErrorResponse),
        (status = 503, description = "Credential storage unavailable", body = ErrorResponse)
    )
)]
pub async fn login_options(
    State(state): State<AppState>,
    body: Result<Json<LoginOptionsRequest>, JsonRejection>,
) -> Result<Json<ChallengeDescriptor>, ApiError> {
    let Json(req) = body.map_err(reject)?;
    let user_id = validate_user_id(req.user_id.as_deref())?;

    let descriptor = state.rp.begin_authentication(user_id).await?;
    Ok(Json(descriptor))
}

/// POST /login_response
///
/// Verify the assertion produced for the outstanding authentication challenge.
#[utoipa::path(
    post,
    path = "/login_response",
    tag = "Authentication",
    request_body = CeremonyResponseRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthenticationResponse),
        (status = 400, description = "Missing user_id or response_data", body = ErrorResponse),
        (status = 401, description = "Assertion rejected or counter did not advance", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "No login in progress", body = ErrorResponse),
        (status = 503, description = "Credential storage unavailable", body = ErrorResponse)
    )
)]
pub async fn login_response(
    State(state): State<AppState>,
    body: Result<Json<CeremonyResponseRequest>, JsonRejection>,
) -> Result<Json<AuthenticationResponse>, ApiError> {
    let Json(req) = body.map_err(reject)?;
    let user_id = validate_user_id(req.user_id.as_deref())?;
    let response = client_response(req.response_data)?;

    let credential = state.rp.complete_authentication(user_id, &response).await?;

    Ok(Json(AuthenticationResponse {
        status: "success",
        message: "Authentication successful!",
        credential_id: credential.credential_id.encode(),
        sign_count: credential.sign_count,
    }))
}

fn reject(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
}

/// Accept the credential either as a JSON object or as a JSON-encoded string.
fn client_response(response_data: Option<serde_json::Value>) -> Result<ClientResponse, ApiError> {
    match response_data {
        Some(serde_json::Value::String(encoded)) => serde_json::from_str(&encoded)
            .map(ClientResponse::new)
            .map_err(|e| ApiError::bad_request(format!("response_data is not valid JSON: {}", e))),
        Some(value @ serde_json::Value::Object(_)) => Ok(ClientResponse::new(value)),
        Some(serde_json::Value::Null) | None => {
            Err(ApiError::bad_request("response_data is required"))
        }
        Some(_) => Err(ApiError::bad_request("response_data must be a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_response_accepts_object_and_string() {
        let object = client_response(Some(json!({"id": "abc"}))).unwrap();
        let string = client_response(Some(json!(r#"{"id":"abc"}"#))).unwrap();
        assert_eq!(object, string);
    }

    #[test]
    fn test_client_response_rejects_missing_and_scalars() {
        assert!(client_response(None).is_err());
        assert!(client_response(Some(serde_json::Value::Null)).is_err());
        assert!(client_response(Some(json!(42))).is_err());
        assert!(client_response(Some(json!("not json"))).is_err());
    }
}
