//! API integration tests for passgate-server.
//!
//! These tests drive the full router with JSON requests, using the in-memory
//! credential store and the software mock authenticator in place of a browser.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use passgate_core::{
    ChallengeDescriptor, CredentialRecord, CredentialStore, MemoryCredentialStore,
    MockAuthenticator, MockResponse, RelyingParty, RelyingPartyConfig, StorageError,
};
use passgate_server::{create_router, create_router_with_config, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

const CREDENTIAL_ID: &[u8] = b"credential-0001";

fn rp_config() -> RelyingPartyConfig {
    let origin = url::Url::parse("http://localhost:8501").unwrap();
    RelyingPartyConfig::new("localhost", "StreamlitApp", &origin).unwrap()
}

fn app_with_store(store: Arc<dyn CredentialStore>) -> Router {
    let rp = RelyingParty::new(rp_config(), store, Arc::new(MockAuthenticator::new()));
    create_router(AppState::new(rp))
}

/// Build the test router using the library's create_router function
fn create_test_app() -> Router {
    app_with_store(Arc::new(MemoryCredentialStore::new()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

fn descriptor(json: Value) -> ChallengeDescriptor {
    serde_json::from_value(json).unwrap()
}

async fn register(app: &Router, user_id: &str) {
    let (status, options) = post(
        app,
        "/register_options",
        json!({"user_id": user_id, "user_name": "Alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response = MockResponse::registration(&descriptor(options), &rp_config(), CREDENTIAL_ID)
        .into_response();
    let (status, body) = post(
        app,
        "/register_response",
        json!({"user_id": user_id, "response_data": response}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

async fn login(app: &Router, user_id: &str, counter: u32) -> (StatusCode, Value) {
    let (status, options) = post(app, "/login_options", json!({"user_id": user_id})).await;
    assert_eq!(status, StatusCode::OK);

    let response = MockResponse::authentication(
        &descriptor(options),
        &rp_config(),
        CREDENTIAL_ID,
        counter,
    )
    .into_response();
    post(
        app,
        "/login_response",
        json!({"user_id": user_id, "response_data": response}),
    )
    .await
}

fn assert_error(status: StatusCode, body: &Value, expected: StatusCode, code: &str) {
    assert_eq!(status, expected, "{}", body);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], code);
    assert!(body["error"].is_string());
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_test_app();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["service"], "passgate-server");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_test_app();

    let (status, json) = get(&app, "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_home_returns_welcome_text() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Welcome to the WebAuthn API!");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_test_app();

    let (status, json) = get(&app, "/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/register_options"].is_object());
    assert!(json["paths"]["/login_response"].is_object());
}

// ============================================================================
// Ceremony Flow Tests
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let app = create_test_app();

    register(&app, "u1").await;

    let (status, body) = login(&app, "u1", 1).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "success");
    assert_eq!(body["sign_count"], 1);

    let (status, body) = login(&app, "u1", 2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sign_count"], 2);
}

#[tokio::test]
async fn test_register_options_descriptor_shape() {
    let app = create_test_app();

    let (status, json) = post(
        &app,
        "/register_options",
        json!({"user_id": "u1", "user_name": "Alice"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ceremony"], "registration");
    assert_eq!(json["user_id"], "u1");
    assert_eq!(json["public_key"]["challenge"], json["challenge"]);
    // Server-side verifier state is never sent to the client.
    assert!(json.get("verifier_state").is_none());
}

#[tokio::test]
async fn test_response_data_as_json_string() {
    let app = create_test_app();

    let (_, options) = post(
        &app,
        "/register_options",
        json!({"user_id": "u1", "user_name": "Alice"}),
    )
    .await;
    let response = MockResponse::registration(&descriptor(options), &rp_config(), CREDENTIAL_ID)
        .into_response();

    let (status, body) = post(
        &app,
        "/register_response",
        json!({"user_id": "u1", "response_data": response.as_json().to_string()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_login_replay_rejected() {
    let app = create_test_app();
    register(&app, "u1").await;

    let (_, options) = post(&app, "/login_options", json!({"user_id": "u1"})).await;
    let response =
        MockResponse::authentication(&descriptor(options), &rp_config(), CREDENTIAL_ID, 1)
            .into_response();
    let request = json!({"user_id": "u1", "response_data": response});

    let (status, _) = post(&app, "/login_response", request.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/login_response", request).await;
    assert_error(status, &body, StatusCode::CONFLICT, "NO_CEREMONY_IN_PROGRESS");
}

#[tokio::test]
async fn test_stale_counter_rejected() {
    let app = create_test_app();
    register(&app, "u1").await;

    let (status, _) = login(&app, "u1", 5).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(&app, "u1", 5).await;
    assert_error(status, &body, StatusCode::UNAUTHORIZED, "STALE_COUNTER");

    // The credential survives and a genuine authenticator can still log in.
    let (status, _) = login(&app, "u1", 6).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_registration_resets_user() {
    let app = create_test_app();

    let (_, options) = post(
        &app,
        "/register_options",
        json!({"user_id": "u1", "user_name": "Alice"}),
    )
    .await;
    let response = MockResponse::registration(&descriptor(options), &rp_config(), CREDENTIAL_ID)
        .with_origin("https://evil.example")
        .into_response();

    let (status, body) = post(
        &app,
        "/register_response",
        json!({"user_id": "u1", "response_data": response}),
    )
    .await;
    assert_error(status, &body, StatusCode::UNAUTHORIZED, "VERIFICATION_FAILED");
    assert!(!body["error"].as_str().unwrap().contains("evil.example"));

    let (status, body) = post(&app, "/login_options", json!({"user_id": "u1"})).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let app = create_test_app();
    register(&app, "u1").await;

    let (status, body) = post(
        &app,
        "/register_options",
        json!({"user_id": "u1", "user_name": "Alice"}),
    )
    .await;
    assert_error(status, &body, StatusCode::CONFLICT, "ALREADY_REGISTERED");
}

// ============================================================================
// Error Mapping Tests
// ============================================================================

#[tokio::test]
async fn test_missing_fields_are_invalid_input() {
    let app = create_test_app();

    let (status, body) = post(&app, "/register_options", json!({"user_id": "u1"})).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    let (status, body) = post(&app, "/login_options", json!({})).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    let (status, body) = post(&app, "/login_response", json!({"user_id": "u1"})).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_malformed_json_is_invalid_input() {
    let app = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/login_options")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_response_without_options() {
    let app = create_test_app();

    let (status, body) = post(
        &app,
        "/register_response",
        json!({"user_id": "u1", "response_data": {"id": "abc"}}),
    )
    .await;
    assert_error(status, &body, StatusCode::CONFLICT, "NO_CEREMONY_IN_PROGRESS");

    let (status, body) = post(
        &app,
        "/login_response",
        json!({"user_id": "u1", "response_data": {"id": "abc"}}),
    )
    .await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_login_options_unknown_user() {
    let app = create_test_app();

    let (status, body) = post(&app, "/login_options", json!({"user_id": "ghost"})).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "USER_NOT_FOUND");
}

/// Store whose backend is unreachable
struct UnreachableStore;

#[async_trait]
impl CredentialStore for UnreachableStore {
    async fn get(&self, _user_id: &str) -> Result<Option<CredentialRecord>, StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }

    async fn put(&self, _record: &CredentialRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }

    async fn swap(
        &self,
        _record: &CredentialRecord,
        _expected_version: Option<u64>,
    ) -> Result<bool, StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_storage_failure_is_service_unavailable() {
    let app = app_with_store(Arc::new(UnreachableStore));

    let (status, body) = post(
        &app,
        "/register_options",
        json!({"user_id": "u1", "user_name": "Alice"}),
    )
    .await;
    assert_error(status, &body, StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR");
    assert!(!body["error"].as_str().unwrap().contains("refused"));

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["storage"], "unavailable");
}

#[tokio::test]
async fn test_ready_fails_when_storage_unreachable() {
    let app = app_with_store(Arc::new(UnreachableStore));

    let (status, body) = get(&app, "/ready").await;
    assert_error(status, &body, StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE");
    assert!(!body["error"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_test_app();

    let (status, body) = get(&app, "/register").await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn test_body_limit_enforced() {
    let rp = RelyingParty::new(
        rp_config(),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MockAuthenticator::new()),
    );
    let config = Config {
        body_limit_kb: 1,
        ..Config::default()
    };
    let app = create_router_with_config(AppState::new(rp), &config);

    let body = json!({"user_id": "u1", "user_name": "a".repeat(4096)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/register_options")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
