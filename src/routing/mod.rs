//! Service routing
//!
//! Maps the path below `/api/v1/` to the backend that serves it. The table is
//! built once from configuration and only read afterwards.

use crate::config::GatewayConfig;

/// A compiled route: path prefix and the backend serving it
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    /// Prefix without leading slash (e.g. "users")
    pub prefix: String,
    /// Service name, used for logs and metrics labels
    pub service: String,
    /// Backend base URL requests are forwarded to
    pub backend_url: String,
    /// Route description
    pub description: Option<String>,
}

impl RouteEntry {
    pub fn new(prefix: &str, service: &str, backend_url: &str) -> Self {
        Self {
            prefix: prefix.trim_start_matches('/').to_string(),
            service: service.to_string(),
            backend_url: backend_url.to_string(),
            description: None,
        }
    }

    /// Check if this route matches the given path
    pub fn matches(&self, path: &str) -> bool {
        path.trim_start_matches('/').starts_with(&self.prefix)
    }
}

/// Ordered prefix table; the first matching entry wins
#[derive(Debug, Clone, Default)]
pub struct ServiceRouter {
    routes: Vec<RouteEntry>,
}

impl ServiceRouter {
    pub fn new(routes: Vec<RouteEntry>) -> Self {
        Self { routes }
    }

    /// Build the table from configuration, resolving service names to URLs.
    ///
    /// Routes naming an unknown service are skipped; `GatewayConfig::validate`
    /// rejects those before we get here.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let routes = config
            .routes
            .iter()
            .filter_map(|route| {
                let backend_url = config.services.get(&route.service)?;
                Some(RouteEntry {
                    description: route.description.clone(),
                    ..RouteEntry::new(&route.prefix, &route.service, backend_url)
                })
            })
            .collect();

        Self { routes }
    }

    /// Resolve a request path to its route
    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Get all configured routes
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }
}
