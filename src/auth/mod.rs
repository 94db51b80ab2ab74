//! Authentication gate
//!
//! Middleware run in front of every proxied route. It verifies the bearer
//! access token and, on success, stamps the caller's identity onto the request
//! as `X-User-Id` so backends can trust the gateway's decision without
//! re-verifying the token.

use axum::{
    extract::{Request, State},
    http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::AppState;
use crate::token::{TokenError, TokenKind, TokenService, UserId};

/// Header carrying the authenticated user id to backends
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Identity resolved by the gate, available to handlers as a request extension
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser(pub UserId);

/// Credential from an `Authorization: <scheme> <token>` header.
///
/// The last whitespace-separated word is taken, so a bare token without a
/// scheme is accepted too.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .last()
}

/// Verify the request's bearer token against the expected kind
pub fn authenticate(
    tokens: &TokenService,
    headers: &HeaderMap,
    expected: TokenKind,
) -> Result<UserId, TokenError> {
    let token = bearer_token(headers).ok_or(TokenError::Missing)?;
    tokens.verify(token, expected)
}

/// Require a valid access token before the request reaches the proxy
pub async fn require_access_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let user_id = authenticate(&state.tokens, request.headers(), TokenKind::Access).map_err(|e| {
        state.metrics.record_auth_failure(e.reason());
        debug!(path = %request.uri().path(), reason = e.reason(), "Access token rejected");
        GatewayError::token(TokenKind::Access, e)
    })?;

    let value = HeaderValue::from_str(&user_id.to_string())
        .map_err(|e| GatewayError::unexpected("Internal server error", e))?;

    // Replaces every client-sent value; the forwarder stamps it again after filtering
    request.headers_mut().insert(USER_ID_HEADER, value);
    request.extensions_mut().insert(AuthenticatedUser(user_id));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    #[test]
    fn test_bearer_token_takes_last_word() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers_with("abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers_with("Bearer   spaced  ")), Some("spaced"));
    }

    #[test]
    fn test_bearer_token_missing() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers_with("")), None);
        assert_eq!(bearer_token(&headers_with("   ")), None);
    }

    #[test]
    fn test_authenticate() {
        let tokens = TokenService::new(b"gate-secret");
        let access = tokens.issue_access(&UserId::from(5)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access.token)).unwrap(),
        );

        assert_eq!(
            authenticate(&tokens, &headers, TokenKind::Access),
            Ok(UserId::Numeric(5))
        );
        assert!(matches!(
            authenticate(&tokens, &headers, TokenKind::Refresh),
            Err(TokenError::WrongKind { .. })
        ));
        assert_eq!(
            authenticate(&tokens, &HeaderMap::new(), TokenKind::Access),
            Err(TokenError::Missing)
        );
        assert_eq!(
            authenticate(&tokens, &headers_with("Bearer"), TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }
}
