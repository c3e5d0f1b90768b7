//! Prometheus metrics for the gateway

use anyhow::Result;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Prometheus metrics collected on the gateway request path
#[derive(Clone)]
pub struct GatewayMetrics {
    requests_total: CounterVec,
    unmatched_requests_total: CounterVec,
    responses_total: CounterVec,
    upstream_retries_total: IntCounter,
    upstream_duration_seconds: HistogramVec,
    registry: Arc<Registry>,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total = CounterVec::new(
            Opts::new("gateway_requests_total", "Requests matched to a route"),
            &["method", "route"],
        )?;

        let unmatched_requests_total = CounterVec::new(
            Opts::new(
                "gateway_unmatched_requests_total",
                "Requests that matched no route",
            ),
            &["method"],
        )?;

        let responses_total = CounterVec::new(
            Opts::new("gateway_responses_total", "Responses by status code"),
            &["status"],
        )?;

        let upstream_retries_total = IntCounter::new(
            "gateway_upstream_retries_total",
            "Forward attempts retried against another instance",
        )?;

        let upstream_duration_seconds = HistogramVec::new(
            Opts::new(
                "gateway_upstream_duration_seconds",
                "Upstream round-trip latency in seconds",
            )
            .into(),
            &["service"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(unmatched_requests_total.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(upstream_retries_total.clone()))?;
        registry.register(Box::new(upstream_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            unmatched_requests_total,
            responses_total,
            upstream_retries_total,
            upstream_duration_seconds,
            registry,
        })
    }

    pub fn record_request(&self, method: &str, route: &str) {
        self.requests_total
            .with_label_values(&[method, route])
            .inc();
    }

    pub fn record_unmatched(&self, method: &str) {
        self.unmatched_requests_total
            .with_label_values(&[method])
            .inc();
    }

    pub fn record_response(&self, status: u16) {
        self.responses_total
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    pub fn record_retry(&self) {
        self.upstream_retries_total.inc();
    }

    pub fn record_upstream_duration(&self, service: &str, elapsed: Duration) {
        self.upstream_duration_seconds
            .with_label_values(&[service])
            .observe(elapsed.as_secs_f64());
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = GatewayMetrics::new().expect("Failed to create metrics");
        assert!(metrics.gather().is_ok());
    }

    #[test]
    fn test_recorded_metrics_appear_in_text_format() {
        let metrics = GatewayMetrics::new().expect("Failed to create metrics");
        metrics.record_request("GET", "/test-id");
        metrics.record_response(200);
        metrics.record_retry();
        metrics.record_upstream_duration("backend-service", Duration::from_millis(12));

        let text = metrics.gather().expect("Failed to gather metrics");
        assert!(text.contains("# HELP"));
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("gateway_responses_total"));
        assert!(text.contains("gateway_upstream_retries_total"));
        assert!(text.contains("gateway_upstream_duration_seconds"));
    }

    #[test]
    fn test_clones_share_registry() {
        let metrics = GatewayMetrics::new().expect("Failed to create metrics");
        let clone = metrics.clone();
        clone.record_request("GET", "/test-id");

        let text = metrics.gather().expect("Failed to gather metrics");
        assert!(text.contains("gateway_requests_total"));
    }
}
