//! Prometheus request counters for the gateway.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `api_gateway_requests_total` - Requests processed (labels: path, method)
//!
//! The `path` label is the route pattern that matched (e.g.
//! `/api/settings/*path`), never the raw request path, so dynamic path tails
//! aggregate under one series.
//!
//! # Recorder Ownership
//!
//! [`RequestMetrics`] owns its own Prometheus recorder instead of installing
//! the process-global one. Each gateway instance (and each test) therefore
//! has an isolated counter set, rendered on demand for `GET /metrics`.
//!
//! # Usage
//!
//! ```rust
//! use edge_gateway::metrics::RequestMetrics;
//!
//! let metrics = RequestMetrics::new();
//! metrics.observe("/auth", "POST");
//! assert!(metrics.render().contains("api_gateway_requests_total"));
//! ```

use metrics::{counter, describe_counter, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "api_gateway_requests_total";
}

/// Content type of the text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Request counters keyed by (route label, method).
///
/// Counters are created on first observation and backed by atomics, so
/// concurrent `observe` calls never lose an increment.
pub struct RequestMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl RequestMetrics {
    /// Create an empty counter set with metric descriptions registered.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        with_local_recorder(&recorder, || {
            describe_counter!(
                names::REQUESTS_TOTAL,
                "Total number of requests processed"
            );
        });

        Self { recorder, handle }
    }

    /// Count one request for `route_label` and `method`.
    pub fn observe(&self, route_label: &str, method: &str) {
        with_local_recorder(&self.recorder, || {
            counter!(
                names::REQUESTS_TOTAL,
                "path" => route_label.to_string(),
                "method" => method.to_string()
            )
            .increment(1);
        });
    }

    /// Render all counters in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    /// Value of the counter series carrying both labels, if rendered.
    fn counter_value(rendered: &str, path: &str, method: &str) -> Option<u64> {
        let path_label = format!("path=\"{path}\"");
        let method_label = format!("method=\"{method}\"");
        rendered
            .lines()
            .filter(|line| line.starts_with(names::REQUESTS_TOTAL))
            .find(|line| line.contains(&path_label) && line.contains(&method_label))
            .and_then(|line| line.split_whitespace().last())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn test_observe_counts_exactly() {
        let metrics = RequestMetrics::new();
        for _ in 0..3 {
            metrics.observe("/auth", "POST");
        }
        metrics.observe("/api/settings/*path", "GET");

        let rendered = metrics.render();
        assert_eq!(counter_value(&rendered, "/auth", "POST"), Some(3));
        assert_eq!(
            counter_value(&rendered, "/api/settings/*path", "GET"),
            Some(1)
        );
        assert_eq!(counter_value(&rendered, "/api/settings/*path", "POST"), None);
    }

    #[test]
    fn test_render_exposition_format() {
        let metrics = RequestMetrics::new();
        metrics.observe("/metrics", "GET");

        let rendered = metrics.render();
        assert!(rendered.contains("# TYPE api_gateway_requests_total counter"));
        assert!(rendered.contains(r#"path="/metrics""#));
        assert!(rendered.contains(r#"method="GET""#));
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = RequestMetrics::new();
        let b = RequestMetrics::new();
        a.observe("/auth", "POST");

        assert_eq!(counter_value(&a.render(), "/auth", "POST"), Some(1));
        assert_eq!(counter_value(&b.render(), "/auth", "POST"), None);
    }

    #[test]
    fn test_concurrent_observations_are_not_lost() {
        const THREADS: u64 = 16;
        const PER_THREAD: u64 = 500;

        let metrics = Arc::new(RequestMetrics::new());
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        metrics.observe("/api/callback-router/*path", "POST");
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(
            counter_value(&metrics.render(), "/api/callback-router/*path", "POST"),
            Some(THREADS * PER_THREAD)
        );
    }
}
