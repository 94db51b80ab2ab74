//! Token module
//!
//! Issues and verifies the gateway's bearer tokens. Tokens are HS256 JWTs with
//! a compact claim set (`user_id`, `token_type`, `exp`); nothing is stored
//! server-side, so a token is valid exactly while its signature checks out and
//! `exp` lies in the future.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default access token lifetime: one hour
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Default refresh token lifetime: seven days
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Longest lifetime accepted from configuration: ten years
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 366 * 24 * 60 * 60;

/// Kind of token, carried in the `token_type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User identifier as handed out by the user service.
///
/// Kept in its JSON shape so a numeric id stays numeric inside the claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl UserId {
    /// Extract a user id from a JSON value; only integers and non-empty strings qualify
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(UserId::Numeric),
            serde_json::Value::String(s) if !s.is_empty() => Some(UserId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Numeric(id) => write!(f, "{}", id),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Numeric(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::Text(id.to_string())
    }
}

/// Claims signed into every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub token_type: String,
    pub exp: i64,
}

/// Reasons a presented credential is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no bearer token presented")]
    Missing,
    #[error("token signature or structure is invalid")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("expected {expected} token, got '{actual}'")]
    WrongKind { expected: TokenKind, actual: String },
}

impl TokenError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Missing => "missing",
            TokenError::Malformed => "malformed",
            TokenError::Expired => "expired",
            TokenError::WrongKind { .. } => "wrong_kind",
        }
    }
}

/// Failures while signing a token
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("token expiry is out of range for a {ttl_secs}s lifetime")]
    ExpiryOutOfRange { ttl_secs: i64 },
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Expiration as an ISO-8601 instant, e.g. `2024-05-01T12:00:00Z`
    pub fn expires_at_iso8601(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Signs and verifies tokens with a single process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service with the default lifetimes
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttls(
            secret,
            Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        )
    }

    /// Create a token service with explicit lifetimes
    pub fn with_ttls(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a short-lived token for proxied API calls
    pub fn issue_access(&self, user_id: &UserId) -> Result<IssuedToken, IssueError> {
        self.issue(user_id, TokenKind::Access, self.access_ttl)
    }

    /// Issue a long-lived token that can only mint new access tokens
    pub fn issue_refresh(&self, user_id: &UserId) -> Result<IssuedToken, IssueError> {
        self.issue(user_id, TokenKind::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: &UserId,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, IssueError> {
        let expires_at = Utc::now()
            .trunc_subsecs(0)
            .checked_add_signed(ttl)
            .ok_or(IssueError::ExpiryOutOfRange {
                ttl_secs: ttl.num_seconds(),
            })?;
        let claims = Claims {
            user_id: user_id.clone(),
            token_type: kind.as_str().to_string(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token's signature, expiry and kind, returning its subject
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<UserId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.token_type != expected.as_str() {
            return Err(TokenError::WrongKind {
                expected,
                actual: data.claims.token_type,
            });
        }

        Ok(data.claims.user_id)
    }
}
