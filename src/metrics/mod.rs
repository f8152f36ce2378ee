//! Prometheus metrics for the analysis endpoint.
//!
//! # Metrics Exposed
//!
//! - `food_scanner_analyze_requests_total` - Requests received
//! - `food_scanner_analyze_invalid_total` - Requests rejected before inference
//! - `food_scanner_analyze_success_total` - Requests answered with nutrition data
//! - `food_scanner_analyze_failure_total` - Requests that failed during inference
//! - `food_scanner_last_inference_seconds` - Duration of the latest inference call
//!
//! # Example
//!
//! ```
//! use food_scanner::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.record_request();
//! assert!(registry.encode().unwrap().contains("food_scanner_analyze_requests_total 1"));
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
