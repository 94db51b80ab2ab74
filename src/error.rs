//! Gateway error type
//!
//! Every failure surfaced to a caller goes through [`GatewayError`]. The
//! status code and public message are looked up explicitly per variant; the
//! internal detail is logged and never sent to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::proxy::ForwardError;
use crate::token::{TokenError, TokenKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A bearer credential was missing or refused; `expected` is the kind the endpoint wanted
    #[error("{expected} token rejected: {error}")]
    Token {
        expected: TokenKind,
        #[source]
        error: TokenError,
    },

    #[error("refusing to forward path '{0}'")]
    InvalidPath(String),

    #[error("no service routes path '{0}'")]
    RouteNotFound(String),

    #[error("backend unavailable: {0}")]
    UpstreamUnavailable(#[source] ForwardError),

    #[error("authentication service unavailable: {0}")]
    AuthServiceUnavailable(#[source] ForwardError),

    /// Anything else; `public` is the only part the caller sees
    #[error("{public}: {source}")]
    Unexpected {
        public: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Error response JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayError {
    pub fn token(expected: TokenKind, error: TokenError) -> Self {
        GatewayError::Token { expected, error }
    }

    pub fn unexpected(public: &'static str, source: impl Into<BoxError>) -> Self {
        GatewayError::Unexpected {
            public,
            source: source.into(),
        }
    }

    /// HTTP status sent to the caller
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Token { expected, error } => match (expected, error) {
                // A missing or mismatched refresh credential is a client usage error
                (TokenKind::Refresh, TokenError::Missing | TokenError::WrongKind { .. }) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::UNAUTHORIZED,
            },
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnavailable(_) | GatewayError::AuthServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `{"error": ...}` body
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Token { expected, error } => match (expected, error) {
                (_, TokenError::WrongKind { .. }) => "Invalid token type",
                (TokenKind::Access, TokenError::Missing) => "Access token required",
                (TokenKind::Access, TokenError::Expired) => "Access token expired",
                (TokenKind::Access, TokenError::Malformed) => "Invalid access token",
                (TokenKind::Refresh, TokenError::Missing) => "Refresh token required",
                (TokenKind::Refresh, TokenError::Expired) => "Refresh token expired",
                (TokenKind::Refresh, TokenError::Malformed) => "Invalid refresh token",
            },
            GatewayError::InvalidPath(_) => "Invalid path",
            GatewayError::RouteNotFound(_) => "Service not found",
            GatewayError::UpstreamUnavailable(_) => "Service unavailable",
            GatewayError::AuthServiceUnavailable(_) => "Authentication service unavailable",
            GatewayError::Unexpected { public, .. } => *public,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Token { .. }
            | GatewayError::InvalidPath(_)
            | GatewayError::RouteNotFound(_) => {
                tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            }
            _ => {
                tracing::error!(error = ?self, status = status.as_u16(), "Request failed");
            }
        }

        let body = ErrorResponse {
            error: self.public_message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
