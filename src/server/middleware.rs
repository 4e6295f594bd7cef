//! HTTP middleware for token-gate
//!
//! This module provides middleware layers for:
//! - The Basic authentication gate (`protected_route`)
//! - Identity attachment from stashed credentials (`attach_user_meta`)
//! - Request/response logging

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{BasicCredentials, CredentialVerifier, Verification};
use crate::error::AuthError;
use crate::models::User;

/// State shared by the gate middleware
#[derive(Clone)]
pub struct GateState {
    verifier: Arc<dyn CredentialVerifier>,
    realm: Arc<str>,
}

impl GateState {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, realm: impl Into<String>) -> Self {
        Self {
            verifier,
            realm: Arc::from(realm.into()),
        }
    }

    /// Verify credentials, turning every failure into an `Unauthorized`
    ///
    /// Verification errors and credential mismatches are logged separately.
    async fn authorize(&self, credentials: &BasicCredentials) -> Result<User, Unauthorized> {
        let outcome = self
            .verifier
            .verify_basic_credentials(&credentials.username, &credentials.password)
            .await;

        match outcome {
            Ok(Verification::Matched(user)) => {
                tracing::debug!(user_id = user.id, "Basic credentials verified");
                Ok(user)
            }
            Ok(Verification::Mismatch(user)) => {
                tracing::info!(
                    outcome = "credential_mismatch",
                    username = %credentials.username,
                    user_exists = user.is_some(),
                    "Basic credentials rejected"
                );
                Err(self.unauthorized())
            }
            Err(e) => Err(self.reject(&e)),
        }
    }

    fn reject(&self, error: &AuthError) -> Unauthorized {
        tracing::warn!(outcome = "verification_error", error = %error, "Basic verification failed");
        self.unauthorized()
    }

    fn unauthorized(&self) -> Unauthorized {
        Unauthorized {
            realm: Arc::clone(&self.realm),
        }
    }
}

/// Identity of the caller, inserted by `attach_user_meta`
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub User);

/// Gate middleware
///
/// This middleware:
/// 1. Decodes the `Authorization: Basic` header
/// 2. Verifies the credentials
/// 3. Rejects with 401 on any failure, otherwise forwards the request unchanged
pub async fn protected_route(
    State(gate): State<GateState>,
    request: Request,
    next: Next,
) -> Result<Response, Unauthorized> {
    let credentials = basic_credentials(&request).map_err(|e| gate.reject(&e))?;
    gate.authorize(&credentials).await?;

    Ok(next.run(request).await)
}

/// Parse Basic credentials into the request extensions
///
/// Never rejects; a missing or malformed header simply leaves nothing in
/// the extensions for `attach_user_meta` to find.
pub async fn stash_basic_credentials(mut request: Request, next: Next) -> Response {
    match basic_credentials(&request) {
        Ok(credentials) => {
            request.extensions_mut().insert(credentials);
        }
        Err(e) => {
            tracing::debug!(error = %e, "No Basic credentials stashed");
        }
    }

    next.run(request).await
}

/// Identity middleware
///
/// Verifies the stashed credentials and, on success, replaces them with an
/// `AuthenticatedUser` extension before forwarding.
pub async fn attach_user_meta(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Unauthorized> {
    let credentials = request
        .extensions_mut()
        .remove::<BasicCredentials>()
        .ok_or_else(|| gate.reject(&AuthError::MissingAuth))?;

    let user = gate.authorize(&credentials).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

fn basic_credentials(request: &Request) -> Result<BasicCredentials, AuthError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("non-ASCII header value".to_string()))?;

    BasicCredentials::from_header_value(header)
}

/// 401 response written by the gate
///
/// The body never carries the reason for the rejection.
#[derive(Debug)]
pub struct Unauthorized {
    realm: Arc<str>,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{}\"", self.realm),
            )],
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
