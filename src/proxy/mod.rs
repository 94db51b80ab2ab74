//! Proxy module for forwarding requests to backend services
//!
//! This module handles request forwarding, including:
//! - Target URL construction (the inbound path is kept, prefix included)
//! - Header filtering and normalization (see [`headers`])
//! - Query parameter merging
//! - Response translation (JSON re-serialization, opaque pass-through otherwise)

pub mod headers;

pub use headers::ForwardHeaders;

use axum::body::Body;
use axum::extract::Query;
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use reqwest::Url;
use std::time::Duration;

use crate::auth::USER_ID_HEADER;
use crate::token::UserId;

/// Failures while forwarding a request
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Network or transport failure talking to the backend
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
    /// `.` or `..` segments, which URL normalization would resolve away
    #[error("path '{0}' contains dot segments")]
    DotSegments(String),
    #[error("invalid query string: {0}")]
    Query(String),
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
}

/// Backend response, buffered and ready to be relayed once
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// The backend's content type, if it sent a textual one
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether the backend declared a JSON body
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Translate into the reply sent to the original caller.
    ///
    /// JSON bodies are parsed and re-serialized, so malformed JSON from the
    /// backend is returned as an error instead of being relayed.
    pub fn relay(self) -> serde_json::Result<Response> {
        if self.is_json() {
            if self.body.is_empty() {
                return Ok(self.status.into_response());
            }
            let value = self.json()?;
            return Ok((self.status, Json(value)).into_response());
        }

        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("text/plain; charset=utf-8"));
        Ok((self.status, [(CONTENT_TYPE, content_type)], self.body).into_response())
    }
}

/// Forwards requests to backend services over a pooled HTTP client
#[derive(Clone)]
pub struct RequestForwarder {
    client: reqwest::Client,
}

impl RequestForwarder {
    /// Create a forwarder whose client gives up on a backend after `timeout`
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }

    /// The underlying client, for callers building their own outbound requests
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Forward a request to `backend_url`, keeping method, path, filtered
    /// headers, query parameters and a non-empty body.
    ///
    /// `X-User-Id` is set to `user_id` after filtering, replacing whatever the
    /// client sent.
    pub async fn forward(
        &self,
        backend_url: &str,
        request: Request<Body>,
        user_id: &UserId,
    ) -> Result<ProxyResponse, ForwardError> {
        let (parts, body) = request.into_parts();

        let mut url = target_url(backend_url, parts.uri.path())?;
        merge_query(&mut url, inbound_query(&parts.uri)?);

        let mut headers = ForwardHeaders::from_header_map(&parts.headers);
        headers.insert(USER_ID_HEADER.as_str(), &user_id.to_string());

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ForwardError::Body)?;

        let mut outbound = self
            .client
            .request(parts.method, url)
            .headers(headers.to_header_map());
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        self.send(outbound).await
    }

    /// Dispatch an outbound request and buffer the response
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<ProxyResponse, ForwardError> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

/// Append the inbound path to the backend base URL, keeping any base path and query.
///
/// Paths with dot segments are refused so the outbound path is always the
/// inbound one.
pub fn target_url(backend_url: &str, path: &str) -> Result<Url, ForwardError> {
    if has_dot_segments(path) {
        return Err(ForwardError::DotSegments(path.to_string()));
    }

    let mut url = Url::parse(backend_url).map_err(|e| ForwardError::InvalidTarget {
        url: backend_url.to_string(),
        reason: e.to_string(),
    })?;

    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    Ok(url)
}

/// Whether any segment is `.` or `..`, literal or percent-encoded
pub fn has_dot_segments(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

fn inbound_query(uri: &Uri) -> Result<Vec<(String, String)>, ForwardError> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs)
        .map_err(|e| ForwardError::Query(e.body_text()))
}

/// Merge inbound query parameters onto the URL's own.
///
/// On a key collision the inbound value replaces the existing one; repeated
/// inbound keys resolve to their last value.
pub fn merge_query(url: &mut Url, inbound: Vec<(String, String)>) {
    if inbound.is_empty() {
        return;
    }

    let mut merged: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in inbound {
        match merged.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => merged.push((key, value)),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(&merged);
}
