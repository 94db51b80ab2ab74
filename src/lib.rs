//! Edge Gateway - bearer token authentication in front of backend services
//!
//! This gateway provides:
//! - Login against a user service, issuing access and refresh tokens
//! - Access token refresh
//! - Path-prefix routing of `/api/v1/*` to backend services
//! - Transparent proxying with header, body and query translation
//! - Prometheus metrics
//! - A liveness probe

pub mod auth;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod proxy;
pub mod routing;
pub mod token;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{build_router, AppState};
