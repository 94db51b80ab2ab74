//! HTTP endpoints
//!
//! Handlers for the externally visible operations: login, token refresh,
//! proxy-forward, plus the liveness probe and metrics exposition.

use axum::{
    extract::{Path, Request, State},
    Extension,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{authenticate, AuthenticatedUser};
use crate::error::GatewayError;
use crate::gateway::AppState;
use crate::proxy::ForwardError;
use crate::token::{IssuedToken, TokenKind, UserId};

/// Scheme reported back to clients alongside issued tokens
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Successful login reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
    pub token_type: String,
    /// The user service's body, echoed unchanged
    pub user: serde_json::Value,
}

/// Successful refresh reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub access_token_expires_at: String,
    pub token_type: String,
}

/// Liveness probe
pub async fn up(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.health.liveness()))
}

/// Metrics handler
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.prometheus_output())
}

/// Anything outside the gateway's routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// `POST /login`: check credentials with the user service and issue a token pair
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, GatewayError> {
    let start = Instant::now();
    let result = login_with_user_service(&state, body).await;
    record(&state, "POST", "login", start, &result);
    result
}

async fn login_with_user_service(state: &AppState, body: Bytes) -> Result<Response, GatewayError> {
    let outbound = state
        .forwarder
        .client()
        .post(&*state.login_url)
        .header(CONTENT_TYPE, "application/json")
        .body(body);

    let response = state
        .forwarder
        .send(outbound)
        .await
        .map_err(|e| {
            upstream_error(
                e,
                GatewayError::AuthServiceUnavailable,
                "Authentication failed",
            )
        })?;

    if response.status != StatusCode::OK {
        warn!(status = response.status.as_u16(), "User service rejected login");
        let error_body = response
            .json()
            .unwrap_or_else(|_| json!({ "error": "Invalid credentials" }));
        return Ok((response.status, Json(error_body)).into_response());
    }

    let user = response
        .json()
        .map_err(|e| GatewayError::unexpected("Authentication failed", e))?;
    let user_id = user
        .get("id")
        .and_then(UserId::from_json)
        .ok_or_else(|| {
            GatewayError::unexpected(
                "Authentication failed",
                "user service reply has no usable id",
            )
        })?;

    let access = issue(state, &user_id, TokenKind::Access, "Authentication failed")?;
    let refresh = issue(state, &user_id, TokenKind::Refresh, "Authentication failed")?;
    info!(user_id = %user_id, "User logged in");

    let reply = LoginResponse {
        access_token: access.token.clone(),
        refresh_token: refresh.token.clone(),
        access_token_expires_at: access.expires_at_iso8601(),
        refresh_token_expires_at: refresh.expires_at_iso8601(),
        token_type: TOKEN_TYPE_BEARER.to_string(),
        user,
    };
    Ok((StatusCode::OK, Json(reply)).into_response())
}

/// `POST /refresh`: trade a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, GatewayError> {
    let user_id = authenticate(&state.tokens, &headers, TokenKind::Refresh).map_err(|e| {
        state.metrics.record_auth_failure(e.reason());
        debug!(reason = e.reason(), "Refresh token rejected");
        GatewayError::token(TokenKind::Refresh, e)
    })?;

    let access = issue(&state, &user_id, TokenKind::Access, "Token refresh failed")?;
    debug!(user_id = %user_id, "Access token refreshed");

    Ok(Json(RefreshResponse {
        access_token: access.token.clone(),
        access_token_expires_at: access.expires_at_iso8601(),
        token_type: TOKEN_TYPE_BEARER.to_string(),
    }))
}

/// `ANY /api/v1/*path`: route by prefix and relay to the backend.
///
/// Runs behind [`crate::auth::require_access_token`].
pub async fn forward_request(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    request: Request,
) -> Result<Response, GatewayError> {
    let start = Instant::now();
    let method = request.method().to_string();

    let Some(route) = state.router.resolve(&path) else {
        let err = GatewayError::RouteNotFound(path);
        state
            .metrics
            .record_request(&method, "unrouted", err.status().as_u16(), start.elapsed());
        return Err(err);
    };

    let forwarded = state
        .forwarder
        .forward(&route.backend_url, request, &user_id)
        .await;
    let result = match forwarded {
        Ok(response) => response
            .relay()
            .map_err(|e| GatewayError::unexpected("Internal server error", e)),
        Err(e) => Err(upstream_error(
            e,
            GatewayError::UpstreamUnavailable,
            "Internal server error",
        )),
    };

    record(&state, &method, &route.service, start, &result);
    result
}

fn issue(
    state: &AppState,
    user_id: &UserId,
    kind: TokenKind,
    public: &'static str,
) -> Result<IssuedToken, GatewayError> {
    let issued = match kind {
        TokenKind::Access => state.tokens.issue_access(user_id),
        TokenKind::Refresh => state.tokens.issue_refresh(user_id),
    }
    .map_err(|e| GatewayError::unexpected(public, e))?;

    state.metrics.record_token_issued(kind.as_str());
    Ok(issued)
}

/// Transport failures become `unavailable`; a refused path is the caller's fault;
/// anything else is unexpected
fn upstream_error(
    error: ForwardError,
    unavailable: fn(ForwardError) -> GatewayError,
    public: &'static str,
) -> GatewayError {
    match error {
        ForwardError::Upstream(_) => unavailable(error),
        ForwardError::DotSegments(path) => GatewayError::InvalidPath(path),
        other => GatewayError::unexpected(public, other),
    }
}

fn record(
    state: &AppState,
    method: &str,
    service: &str,
    start: Instant,
    result: &Result<Response, GatewayError>,
) {
    let status = match result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    state
        .metrics
        .record_request(method, service, status.as_u16(), start.elapsed());
}
