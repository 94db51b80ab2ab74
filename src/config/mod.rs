//! Configuration module for the gateway service
//!
//! This module handles loading and parsing configuration from TOML files.
//! Everything here is read once at startup and treated as immutable afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::token::{ACCESS_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

/// Environment variable that overrides `auth.secret` when set
pub const SECRET_ENV_VAR: &str = "EDGE_GATEWAY_SECRET";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to expose metrics
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

/// Liveness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Path for the liveness endpoint
    #[serde(default = "default_health_path")]
    pub path: String,
}

fn default_health_path() -> String {
    "/up".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_health_path(),
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret shared by every token the gateway issues
    #[serde(default)]
    pub secret: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: i64,
}

fn default_access_token_ttl() -> i64 {
    ACCESS_TOKEN_TTL_SECS
}

fn default_refresh_token_ttl() -> i64 {
    REFRESH_TOKEN_TTL_SECS
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
        }
    }
}

/// Where login requests are forwarded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Name of the service (from `[services]`) that checks credentials
    #[serde(default = "default_login_service")]
    pub service: String,
    /// Path on that service receiving the credentials
    #[serde(default = "default_login_path")]
    pub path: String,
}

fn default_login_service() -> String {
    "users".to_string()
}

fn default_login_path() -> String {
    "/api/v1/auth/login".to_string()
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            service: default_login_service(),
            path: default_login_path(),
        }
    }
}

/// Route configuration: a path prefix under `/api/v1/` and the service serving it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Prefix matched against the path after `/api/v1/` (e.g. "users")
    pub prefix: String,
    /// Service name from `[services]`
    pub service: String,
    /// Route description
    #[serde(default)]
    pub description: Option<String>,
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Liveness probe configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Token signing configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Login forwarding configuration
    #[serde(default)]
    pub login: LoginConfig,
    /// Backend services by name
    #[serde(default)]
    pub services: BTreeMap<String, String>,
    /// Ordered route table, first match wins
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file, applying environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: GatewayConfig = toml::from_str(&contents)?;
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                config.auth.secret = secret;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.secret.trim().is_empty() {
            anyhow::bail!(
                "No signing secret configured. Set auth.secret or {}",
                SECRET_ENV_VAR
            );
        }
        for (name, ttl) in [
            ("access_token_ttl", self.auth.access_token_ttl),
            ("refresh_token_ttl", self.auth.refresh_token_ttl),
        ] {
            if ttl <= 0 || ttl > MAX_TOKEN_TTL_SECS {
                anyhow::bail!(
                    "auth.{} must be between 1 and {} seconds, got {}",
                    name,
                    MAX_TOKEN_TTL_SECS,
                    ttl
                );
            }
        }

        for (name, url) in &self.services {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("Service '{}' has invalid URL '{}': {}", name, url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Service '{}' must use http or https, got '{}'", name, url);
            }
        }

        for route in &self.routes {
            if route.prefix.trim_matches('/').is_empty() {
                anyhow::bail!("Route for service '{}' has an empty prefix", route.service);
            }
            if !self.services.contains_key(&route.service) {
                anyhow::bail!(
                    "Route '{}' references unknown service '{}'",
                    route.prefix,
                    route.service
                );
            }
        }

        if !self.services.contains_key(&self.login.service) {
            anyhow::bail!("Login references unknown service '{}'", self.login.service);
        }

        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Full URL login requests are posted to
    pub fn login_url(&self) -> Option<String> {
        self.services.get(&self.login.service).map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.login.path.trim_start_matches('/')
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 4000
timeout = 5

[auth]
secret = "test-secret"

[services]
users = "http://localhost:3001/"

[[routes]]
prefix = "users"
service = "users"

[[routes]]
prefix = "collections"
service = "users"
"#;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.health.path, "/up");
        assert_eq!(config.auth.access_token_ttl, 3600);
        assert_eq!(config.auth.refresh_token_ttl, 604800);
        assert_eq!(config.login.path, "/api/v1/auth/login");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_parse_config() {
        let config = GatewayConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.server_addr(), "127.0.0.1:4000");
        assert_eq!(config.server.timeout, 5);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].prefix, "users");
        assert_eq!(config.routes[1].prefix, "collections");
        assert_eq!(config.services["users"], "http://localhost:3001/");
    }

    #[test]
    fn test_login_url_joins_without_double_slash() {
        let config = GatewayConfig::parse(SAMPLE).unwrap();
        assert_eq!(
            config.login_url().as_deref(),
            Some("http://localhost:3001/api/v1/auth/login")
        );
    }

    #[test]
    fn test_missing_secret_rejected() {
        let toml = r#"
[services]
users = "http://localhost:3001"
"#;
        let err = GatewayConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("No signing secret configured"));
    }

    #[test]
    fn test_unknown_route_service_rejected() {
        let toml = r#"
[auth]
secret = "s"

[services]
users = "http://localhost:3001"

[[routes]]
prefix = "orders"
service = "orders"
"#;
        let err = GatewayConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("unknown service 'orders'"));
    }

    #[test]
    fn test_unknown_login_service_rejected() {
        let toml = r#"
[auth]
secret = "s"

[services]
accounts = "http://localhost:3001"
"#;
        let err = GatewayConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("Login references unknown service"));
    }

    #[test]
    fn test_invalid_service_url_rejected() {
        let toml = r#"
[auth]
secret = "s"

[services]
users = "not a url"
"#;
        assert!(GatewayConfig::parse(toml).is_err());

        let toml = r#"
[auth]
secret = "s"

[services]
users = "ftp://localhost"
"#;
        assert!(GatewayConfig::parse(toml).is_err());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let toml = r#"
[auth]
secret = "s"
access_token_ttl = 0

[services]
users = "http://localhost:3001"
"#;
        assert!(GatewayConfig::parse(toml).is_err());
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let toml = r#"
[auth]
secret = "s"
refresh_token_ttl = 10000000000000

[services]
users = "http://localhost:3001"
"#;
        let err = GatewayConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("refresh_token_ttl"));

        let toml = r#"
[auth]
secret = "s"
access_token_ttl = 9223372036854775807

[services]
users = "http://localhost:3001"
"#;
        assert!(GatewayConfig::parse(toml).is_err());
    }
}
