//! HTTP router for token-gate
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - The token API, behind the Basic authentication gate

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::middleware::{
    attach_user_meta, logging_middleware, protected_route, stash_basic_credentials,
    AuthenticatedUser, GateState,
};
use crate::auth::TokenLifecycle;
use crate::database::TokenStore;
use crate::error::TokenError;
use crate::models::{IssueTokenRequest, IssuedToken, TokenSummary};

/// Values used when an issue request leaves a field out
#[derive(Debug, Clone, Copy)]
pub struct TokenDefaults {
    pub length: usize,
    pub ttl_secs: i64,
}

impl Default for TokenDefaults {
    fn default() -> Self {
        Self {
            length: 32,
            ttl_secs: 3600,
        }
    }
}

/// Shared application state
pub struct AppState<S: TokenStore> {
    /// Gate middleware state
    pub gate: GateState,

    /// Token lifecycle manager
    pub tokens: Arc<TokenLifecycle<S>>,

    /// Defaults for issue requests
    pub token_defaults: TokenDefaults,
}

impl<S: TokenStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            tokens: Arc::clone(&self.tokens),
            token_defaults: self.token_defaults,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
///
/// Read-only token routes sit behind `protected_route`. Routes that need the
/// caller's identity run `stash_basic_credentials` and then
/// `attach_user_meta`.
pub fn build_router<S: TokenStore + 'static>(state: AppState<S>) -> Router {
    let protected = Router::new()
        .route("/api/v0/tokens", get(list_tokens_handler::<S>))
        .route("/api/v0/tokens/:value", get(get_token_handler::<S>))
        .route_layer(from_fn_with_state(state.gate.clone(), protected_route));

    // Layers run outermost-last: the stash runs before attach_user_meta
    let identified = Router::new()
        .route("/api/v0/tokens", post(issue_token_handler::<S>))
        .route("/api/v0/tokens/:value", delete(revoke_token_handler::<S>))
        .route(
            "/api/v0/tokens/:value/validate",
            post(validate_token_handler::<S>),
        )
        .route("/api/v0/me", get(me_handler))
        .route_layer(from_fn_with_state(state.gate.clone(), attach_user_meta))
        .route_layer(from_fn(stash_basic_credentials));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .merge(identified)
        .fallback(not_found_handler)
        .layer(from_fn(logging_middleware))
        .with_state(state)
}

// =============================================================================
// Health and Fallback Handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}

// =============================================================================
// Token API Handlers
// =============================================================================

/// Map a lifecycle error to a JSON error response
///
/// Persistence details are logged and replaced by a generic message.
fn token_error_response(error: TokenError, action: &str) -> Response {
    let (status, message) = match &error {
        TokenError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        TokenError::NotFound => (StatusCode::NOT_FOUND, error.to_string()),
        TokenError::InvalidState { .. } => (StatusCode::CONFLICT, error.to_string()),
        TokenError::Persistence(e) => {
            tracing::error!(error = %e, "Failed to {}", action);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", action),
            )
        }
    };

    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// List tokens handler (values masked)
async fn list_tokens_handler<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
) -> Response {
    match state.tokens.list_all().await {
        Ok(tokens) => {
            let summaries: Vec<TokenSummary> = tokens.iter().map(TokenSummary::from).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "tokens": summaries })),
            )
                .into_response()
        }
        Err(e) => token_error_response(e, "list tokens"),
    }
}

/// Get a single token, applying lazy expiry
async fn get_token_handler<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
    Path(value): Path<String>,
) -> Response {
    match state.tokens.lookup_current(&value).await {
        Ok(token) => (StatusCode::OK, Json(TokenSummary::from(&token))).into_response(),
        Err(e) => token_error_response(e, "look up token"),
    }
}

/// Issue a token owned by the authenticated caller
async fn issue_token_handler<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    payload: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": rejection.body_text() })),
            )
                .into_response()
        }
    };

    let length = req.length.unwrap_or(state.token_defaults.length);
    let ttl_secs = req.ttl_seconds.unwrap_or(state.token_defaults.ttl_secs);

    let value = match state.tokens.issue(user.id, length, ttl_secs).await {
        Ok(value) => value,
        Err(e) => return token_error_response(e, "issue token"),
    };

    match state.tokens.lookup(&value).await {
        Ok(token) => (
            StatusCode::CREATED,
            Json(IssuedToken {
                value: token.value,
                expires_at: token.expires_at,
            }),
        )
            .into_response(),
        Err(e) => token_error_response(e, "issue token"),
    }
}

/// Revoke a token
async fn revoke_token_handler<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(value): Path<String>,
) -> Response {
    match state.tokens.revoke(&value).await {
        Ok(()) => {
            tracing::debug!(user_id = user.id, "Revoke request completed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => token_error_response(e, "revoke token"),
    }
}

/// Check that a token is usable
async fn validate_token_handler<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
    Path(value): Path<String>,
) -> Response {
    match state.tokens.validate(&value).await {
        Ok(token) => (StatusCode::OK, Json(TokenSummary::from(&token))).into_response(),
        Err(e) => token_error_response(e, "validate token"),
    }
}

/// Identity of the authenticated caller
async fn me_handler(Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, AuthGate, BasicCredentials, LifecycleConfig};
    use crate::database::MemoryDatabase;
    use crate::models::{TokenStatus, User};
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;

    struct Harness {
        db: Arc<MemoryDatabase>,
        server: TestServer,
    }

    fn create_test_server() -> Harness {
        let users = Arc::new(MemoryDatabase::new());
        users
            .insert_user(User::new(3, "admin", hash_password("123456").unwrap()))
            .unwrap();
        let db = Arc::new(MemoryDatabase::new());

        let gate = GateState::new(Arc::new(AuthGate::new(users)), "token-gate");
        let tokens = Arc::new(TokenLifecycle::new(
            Arc::clone(&db),
            LifecycleConfig::default(),
        ));
        let state = AppState {
            gate,
            tokens,
            token_defaults: TokenDefaults::default(),
        };

        let server = TestServer::new(build_router(state)).unwrap();
        Harness { db, server }
    }

    fn admin_auth() -> HeaderValue {
        HeaderValue::from_str(&BasicCredentials::new("admin", "123456").to_header_value()).unwrap()
    }

    async fn issue(server: &TestServer, body: serde_json::Value) -> IssuedToken {
        let response = server
            .post("/api/v0/tokens")
            .add_header(header::AUTHORIZATION, admin_auth())
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    // Test 1: Health endpoint returns OK without credentials
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let harness = create_test_server();

        let response = harness.server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
    }

    // Test 2: Unknown route is a JSON 404
    #[tokio::test]
    async fn test_fallback_not_found() {
        let harness = create_test_server();

        let response = harness.server.get("/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Not found");
    }

    // Test 3: Token routes require credentials
    #[tokio::test]
    async fn test_token_routes_require_auth() {
        let harness = create_test_server();

        harness
            .server
            .get("/api/v0/tokens")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        harness
            .server
            .post("/api/v0/tokens")
            .json(&serde_json::json!({}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        harness
            .server
            .get("/api/v0/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 4: Wrong password is rejected
    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let harness = create_test_server();
        let bad = BasicCredentials::new("admin", "654321").to_header_value();

        harness
            .server
            .get("/api/v0/tokens")
            .add_header(header::AUTHORIZATION, HeaderValue::from_str(&bad).unwrap())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 5: Issue uses defaults and the caller as owner
    #[tokio::test]
    async fn test_issue_token_with_defaults() {
        let harness = create_test_server();

        let issued = issue(&harness.server, serde_json::json!({})).await;
        assert_eq!(issued.value.len(), 32);

        let token = harness.db.get_token_by_value(&issued.value).await.unwrap().unwrap();
        assert_eq!(token.owner_id, 3);
        assert_eq!(token.status, TokenStatus::Active);
        assert_eq!(token.expires_at, issued.expires_at);
    }

    // Test 6: Invalid issue arguments are a 400
    #[tokio::test]
    async fn test_issue_token_invalid_arguments() {
        let harness = create_test_server();

        for body in [
            serde_json::json!({ "length": 0 }),
            serde_json::json!({ "ttl_seconds": 0 }),
            serde_json::json!({ "length": -4 }),
        ] {
            harness
                .server
                .post("/api/v0/tokens")
                .add_header(header::AUTHORIZATION, admin_auth())
                .json(&body)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }

    // Test 7: List masks values
    #[tokio::test]
    async fn test_list_tokens_masks_values() {
        let harness = create_test_server();
        let issued = issue(&harness.server, serde_json::json!({ "length": 40 })).await;

        let response = harness
            .server
            .get("/api/v0/tokens")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let tokens = body["tokens"].as_array().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0]["value_hint"], format!("{}...", &issued.value[..4]));
        assert!(!response.text().contains(&issued.value));
    }

    // Test 8: Revoke, then validate reports a conflict
    #[tokio::test]
    async fn test_revoke_then_validate() {
        let harness = create_test_server();
        let issued = issue(&harness.server, serde_json::json!({})).await;
        let path = format!("/api/v0/tokens/{}", issued.value);

        harness
            .server
            .post(&format!("{}/validate", path))
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status_ok();

        harness
            .server
            .delete(&path)
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // Revoking again is a no-op
        harness
            .server
            .delete(&path)
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        harness
            .server
            .post(&format!("{}/validate", path))
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    // Test 9: Lookup of a lapsed token reports it expired
    #[tokio::test]
    async fn test_get_token_applies_lazy_expiry() {
        let harness = create_test_server();
        let issued_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let token = crate::models::Token::new("old", "lapsedvalue", 3, issued_at, chrono::Duration::hours(1))
            .unwrap();
        harness.db.create_token(&token).await.unwrap();

        let response = harness
            .server
            .get("/api/v0/tokens/lapsedvalue")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await;
        response.assert_status_ok();

        let summary: TokenSummary = response.json();
        assert_eq!(summary.status, TokenStatus::Expired);

        // Revoking an expired token is a conflict
        harness
            .server
            .delete("/api/v0/tokens/lapsedvalue")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    // Test 10: Unknown token value is a 404
    #[tokio::test]
    async fn test_unknown_token_not_found() {
        let harness = create_test_server();

        harness
            .server
            .get("/api/v0/tokens/missing")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        harness
            .server
            .delete("/api/v0/tokens/missing")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // Test 11: Store failure is a generic 500
    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let harness = create_test_server();
        harness.db.set_unavailable(true);

        let response = harness
            .server
            .get("/api/v0/tokens")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Failed to list tokens");
        assert!(!response.text().contains("switched off"));
    }

    // Test 12: /me returns the authenticated user without the hash
    #[tokio::test]
    async fn test_me_returns_identity() {
        let harness = create_test_server();

        let response = harness
            .server
            .get("/api/v0/me")
            .add_header(header::AUTHORIZATION, admin_auth())
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["id"], 3);
        assert_eq!(body["username"], "admin");
        assert!(body.get("password_hash").is_none());
    }

    // Test 13: token error mapping
    #[test]
    fn test_token_error_response_status() {
        use crate::error::DbError;

        let cases = [
            (TokenError::InvalidArgument("x".to_string()), StatusCode::BAD_REQUEST),
            (TokenError::NotFound, StatusCode::NOT_FOUND),
            (
                TokenError::InvalidState {
                    status: TokenStatus::Revoked,
                    action: "use",
                },
                StatusCode::CONFLICT,
            ),
            (
                TokenError::Persistence(DbError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(token_error_response(error, "test").status(), expected);
        }
    }
}
