//! Metrics collection and registry.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for the analysis endpoint.
pub struct MetricsRegistry {
    registry: Registry,

    requests_total: IntCounter,
    invalid_total: IntCounter,
    success_total: IntCounter,
    failure_total: IntCounter,
    last_inference_seconds: Gauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all endpoint metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests_total = IntCounter::new(
            "food_scanner_analyze_requests_total",
            "Total analysis requests received",
        )?;
        let invalid_total = IntCounter::new(
            "food_scanner_analyze_invalid_total",
            "Analysis requests rejected for invalid image data",
        )?;
        let success_total = IntCounter::new(
            "food_scanner_analyze_success_total",
            "Analysis requests answered with nutrition data",
        )?;
        let failure_total = IntCounter::new(
            "food_scanner_analyze_failure_total",
            "Analysis requests that failed during inference",
        )?;
        let last_inference_seconds = Gauge::new(
            "food_scanner_last_inference_seconds",
            "Duration of the most recent inference call",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(invalid_total.clone()))?;
        registry.register(Box::new(success_total.clone()))?;
        registry.register(Box::new(failure_total.clone()))?;
        registry.register(Box::new(last_inference_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            invalid_total,
            success_total,
            failure_total,
            last_inference_seconds,
        })
    }

    pub fn record_request(&self) {
        self.requests_total.inc();
    }

    pub fn record_invalid(&self) {
        self.invalid_total.inc();
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.success_total.inc();
        self.last_inference_seconds.set(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.failure_total.inc();
        self.last_inference_seconds.set(elapsed.as_secs_f64());
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_counters_recorded() {
        let registry = MetricsRegistry::new().unwrap();

        registry.record_request();
        registry.record_request();
        registry.record_invalid();
        registry.record_success(Duration::from_millis(1500));

        let output = registry.encode().unwrap();
        assert!(output.contains("food_scanner_analyze_requests_total 2"));
        assert!(output.contains("food_scanner_analyze_invalid_total 1"));
        assert!(output.contains("food_scanner_analyze_success_total 1"));
        assert!(output.contains("food_scanner_last_inference_seconds 1.5"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("food_scanner_analyze_requests_total"));
        assert!(output.contains("food_scanner_analyze_failure_total"));
    }
}
