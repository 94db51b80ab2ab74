//! Gateway assembly
//!
//! Builds the shared application state from configuration and wires the
//! endpoints into an axum router.

use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::config::GatewayConfig;
use crate::endpoints;
use crate::health::HealthChecker;
use crate::metrics::GatewayMetrics;
use crate::proxy::RequestForwarder;
use crate::routing::ServiceRouter;
use crate::token::TokenService;

/// Application state shared across handlers; immutable after startup
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub router: Arc<ServiceRouter>,
    pub forwarder: RequestForwarder,
    pub login_url: Arc<str>,
    pub metrics: Arc<GatewayMetrics>,
    pub health: Arc<HealthChecker>,
}

impl AppState {
    /// Build state from a validated configuration
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let ttl = |secs: i64| {
            chrono::Duration::try_seconds(secs)
                .ok_or_else(|| anyhow::anyhow!("Token lifetime of {}s is out of range", secs))
        };
        let tokens = TokenService::with_ttls(
            config.auth.secret.as_bytes(),
            ttl(config.auth.access_token_ttl)?,
            ttl(config.auth.refresh_token_ttl)?,
        );

        let login_url = config.login_url().ok_or_else(|| {
            anyhow::anyhow!("Login references unknown service '{}'", config.login.service)
        })?;

        Ok(Self {
            tokens: Arc::new(tokens),
            router: Arc::new(ServiceRouter::from_config(config)),
            forwarder: RequestForwarder::new(Duration::from_secs(config.server.timeout))?,
            login_url: login_url.into(),
            metrics: Arc::new(GatewayMetrics::new()?),
            health: Arc::new(HealthChecker::new()),
        })
    }
}

/// Build the HTTP router.
///
/// Only `/api/v1/*path` sits behind the access token gate; login, refresh,
/// liveness and metrics are public.
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let proxied = Router::new()
        .route("/api/v1/*path", any(endpoints::forward_request))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_access_token,
        ));

    let mut app = Router::new()
        .route(&config.health.path, get(endpoints::up))
        .route("/login", post(endpoints::login))
        .route("/refresh", post(endpoints::refresh));

    if config.metrics.enabled {
        app = app.route(&config.metrics.path, get(endpoints::metrics));
    }

    app.merge(proxied)
        .fallback(endpoints::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
