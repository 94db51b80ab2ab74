//! Header translation for forwarded requests
//!
//! Inbound headers may arrive in wire form (`x-custom`) or in CGI/env form
//! (`HTTP_X_CUSTOM`, `CONTENT_TYPE`). Both are normalized to canonical
//! `Word-Word` names and filtered before being copied onto the outbound request.
//!
//! Env form is recognised only in upper case. `http::HeaderMap` lowercases every
//! name, so a wire header can never be renamed into another header; wire names
//! containing `_` are dropped instead.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

/// Headers that never leave the gateway: server-internal values and hop-by-hop headers
const EXCLUDED_HEADERS: &[&str] = &[
    "host",
    "version",
    "server-name",
    "server-port",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Env-style names forwarded even though they lack the `HTTP_` prefix
const UNPREFIXED_ENV_HEADERS: &[&str] = &["CONTENT_TYPE", "CONTENT_LENGTH"];

/// Case-insensitive header set; inserting an existing name replaces its value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardHeaders {
    entries: Vec<(String, String)>,
}

impl ForwardHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filtered set from raw name/value pairs
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a HeaderValue)>,
    {
        let mut headers = Self::new();
        for (raw_name, value) in pairs {
            let Some(name) = forwardable_name(raw_name) else {
                continue;
            };
            match value.to_str() {
                Ok(value) => headers.insert(&name, value),
                Err(_) => debug!(header = %name, "Dropping header with non-text value"),
            }
        }
        headers
    }

    /// Build a filtered set from an inbound request's headers
    pub fn from_header_map(map: &HeaderMap) -> Self {
        Self::from_pairs(map.iter().map(|(name, value)| (name.as_str(), value)))
    }

    /// Insert a header under its canonical name, replacing any previous value
    pub fn insert(&mut self, name: &str, value: &str) {
        let name = canonical_name(name);
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name, value.to_string())),
        }
    }

    /// Look up a header value, ignoring case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Convert into an `http` header map for the outbound client
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => debug!(header = %name, "Skipping header that is not valid on the wire"),
            }
        }
        map
    }
}

/// Normalize a header name to `Word-Word` form (`HTTP_X_CUSTOM` keeps its
/// prefix here; see [`forwardable_name`] for prefix handling).
pub fn canonical_name(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Canonical outbound name for an inbound header, or `None` if it must not be forwarded
pub fn forwardable_name(raw: &str) -> Option<String> {
    // Dotted names belong to the server framework's own namespace
    if raw.contains('.') {
        return None;
    }

    let name = if raw.contains('_') {
        if raw.bytes().any(|b| b.is_ascii_lowercase()) {
            return None;
        }
        match raw.strip_prefix("HTTP_") {
            Some(rest) => rest.to_string(),
            None if UNPREFIXED_ENV_HEADERS.contains(&raw) => raw.to_string(),
            // CGI variables such as SERVER_NAME or REQUEST_METHOD
            None => return None,
        }
    } else {
        raw.to_string()
    };

    let canonical = canonical_name(&name);
    if canonical.is_empty() {
        return None;
    }
    let lower = canonical.to_ascii_lowercase();
    if EXCLUDED_HEADERS.contains(&lower.as_str()) {
        return None;
    }
    Some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: &'static str) -> HeaderValue {
        HeaderValue::from_static(v)
    }

    #[test]
    fn test_env_style_headers_filtered_and_renamed() {
        let foo = value("bar");
        let host = value("x");
        let content_type = value("application/json");
        let headers = ForwardHeaders::from_pairs([
            ("HTTP_X_FOO", &foo),
            ("HTTP_HOST", &host),
            ("CONTENT_TYPE", &content_type),
        ]);

        let mut expected = ForwardHeaders::new();
        expected.insert("X-Foo", "bar");
        expected.insert("Content-Type", "application/json");
        assert_eq!(headers, expected);
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("X-Foo", "bar"), ("Content-Type", "application/json")]
        );
    }

    #[test]
    fn test_server_internal_headers_dropped() {
        let v = value("1");
        let headers = ForwardHeaders::from_pairs([
            ("HTTP_VERSION", &v),
            ("SERVER_NAME", &v),
            ("SERVER_PORT", &v),
            ("REQUEST_METHOD", &v),
            ("action_dispatch.request_id", &v),
            ("rack.input", &v),
            ("CONTENT_LENGTH", &v),
        ]);

        assert_eq!(headers.iter().count(), 1);
        assert_eq!(headers.get("content-length"), Some("1"));
    }

    #[test]
    fn test_wire_headers_canonicalized() {
        let mut map = HeaderMap::new();
        map.insert("x-custom-header", value("a"));
        map.insert("content-type", value("text/plain"));
        map.insert("authorization", value("Bearer t"));
        map.insert("host", value("gateway.local"));
        map.insert("connection", value("keep-alive"));
        map.insert("transfer-encoding", value("chunked"));

        let headers = ForwardHeaders::from_header_map(&map);
        assert_eq!(headers.iter().count(), 3);
        assert_eq!(headers.get("X-Custom-Header"), Some("a"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("Authorization"), Some("Bearer t"));
        assert!(headers.iter().any(|(name, _)| name == "X-Custom-Header"));
    }

    #[test]
    fn test_wire_underscore_names_not_renamed() {
        let mut map = HeaderMap::new();
        map.insert("x-user-id", value("1"));
        map.insert("http_x_user_id", value("999"));
        map.insert("content_type", value("text/html"));

        let headers = ForwardHeaders::from_header_map(&map);
        assert_eq!(headers.iter().count(), 1);
        assert_eq!(headers.get("X-User-Id"), Some("1"));
        assert_eq!(headers.get("Content-Type"), None);
    }

    #[test]
    fn test_mixed_case_env_names_dropped() {
        assert_eq!(forwardable_name("HTTP_X_FOO"), Some("X-Foo".to_string()));
        assert_eq!(forwardable_name("Http_X_Foo"), None);
        assert_eq!(forwardable_name("http_x_foo"), None);
    }

    #[test]
    fn test_non_text_values_dropped() {
        let binary = HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap();
        let ok = value("yes");
        let headers = ForwardHeaders::from_pairs([("x-binary", &binary), ("x-ok", &ok)]);

        assert_eq!(headers.get("X-Binary"), None);
        assert_eq!(headers.get("X-Ok"), Some("yes"));
    }

    #[test]
    fn test_insert_is_case_insensitive_last_write_wins() {
        let mut headers = ForwardHeaders::new();
        headers.insert("x-user-id", "1");
        headers.insert("X-USER-ID", "2");

        assert_eq!(headers.iter().count(), 1);
        assert_eq!(headers.get("X-User-Id"), Some("2"));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("X_CUSTOM"), "X-Custom");
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("ACCEPT"), "Accept");
        assert_eq!(canonical_name("x--double"), "X-Double");
    }

    #[test]
    fn test_to_header_map() {
        let mut headers = ForwardHeaders::new();
        headers.insert("X-Foo", "bar");
        headers.insert("Content-Type", "application/json");

        let map = headers.to_header_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-foo").unwrap(), "bar");
        assert_eq!(map.get("content-type").unwrap(), "application/json");
    }
}
