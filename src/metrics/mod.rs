//! Metrics module for Prometheus
//!
//! This module provides metrics collection for the gateway service:
//! - Request count by method, service, and status
//! - Request latency histogram
//! - Authentication failures by reason
//! - Tokens issued by kind

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::warn;

/// Gateway metrics collector
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    request_counter: CounterVec,
    request_latency: HistogramVec,
    auth_failures: CounterVec,
    tokens_issued: CounterVec,
}

impl GatewayMetrics {
    /// Create a new metrics instance with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let request_counter = CounterVec::new(
            Opts::new("gateway_requests_total", "Total number of requests"),
            &["method", "service", "status"],
        )?;

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_latency_seconds",
                "Request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "service"],
        )?;

        let auth_failures = CounterVec::new(
            Opts::new(
                "gateway_auth_failures_total",
                "Rejected credentials by reason",
            ),
            &["reason"],
        )?;

        let tokens_issued = CounterVec::new(
            Opts::new("gateway_tokens_issued_total", "Tokens issued by kind"),
            &["kind"],
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(auth_failures.clone()))?;
        registry.register(Box::new(tokens_issued.clone()))?;

        Ok(Self {
            registry,
            request_counter,
            request_latency,
            auth_failures,
            tokens_issued,
        })
    }

    /// Record a request with its status and latency.
    ///
    /// `service` is the routed service name, or an endpoint label such as
    /// "login" for requests the gateway answers itself.
    pub fn record_request(&self, method: &str, service: &str, status: u16, latency: Duration) {
        let status_str = status.to_string();

        self.request_counter
            .with_label_values(&[method, service, &status_str])
            .inc();

        self.request_latency
            .with_label_values(&[method, service])
            .observe(latency.as_secs_f64());
    }

    /// Record a rejected credential
    pub fn record_auth_failure(&self, reason: &str) {
        self.auth_failures.with_label_values(&[reason]).inc();
    }

    /// Record an issued token
    pub fn record_token_issued(&self, kind: &str) {
        self.tokens_issued.with_label_values(&[kind]).inc();
    }

    /// Get the Prometheus metrics output
    pub fn prometheus_output(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_output() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_request("GET", "users", 200, Duration::from_millis(10));

        let output = metrics.prometheus_output();
        assert!(output.contains("gateway_requests_total"));
        assert!(output.contains("gateway_request_latency_seconds"));
        assert!(output.contains("service=\"users\""));
        assert!(output.contains("status=\"200\""));
    }

    #[test]
    fn test_auth_failure_counter() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_auth_failure("expired");
        metrics.record_auth_failure("expired");
        metrics.record_auth_failure("missing");

        let output = metrics.prometheus_output();
        assert!(output.contains("gateway_auth_failures_total{reason=\"expired\"} 2"));
        assert!(output.contains("gateway_auth_failures_total{reason=\"missing\"} 1"));
    }

    #[test]
    fn test_tokens_issued_counter() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_token_issued("access");
        metrics.record_token_issued("refresh");
        metrics.record_token_issued("access");

        let output = metrics.prometheus_output();
        assert!(output.contains("gateway_tokens_issued_total{kind=\"access\"} 2"));
        assert!(output.contains("gateway_tokens_issued_total{kind=\"refresh\"} 1"));
    }

    #[test]
    fn test_separate_registries() {
        let first = GatewayMetrics::new().unwrap();
        let second = GatewayMetrics::new().unwrap();
        first.record_auth_failure("malformed");

        assert!(!second.prometheus_output().contains("reason=\"malformed\""));
    }
}
