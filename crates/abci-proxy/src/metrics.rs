//! Per-method call timing.

use abci_types::Method;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Instant;

/// Name of the timing histogram family.
pub const METHOD_TIMING: &str = "abci_connection_method_timing_seconds";

/// Whether a call waited for its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    /// The caller waited for the response.
    Sync,
    /// The caller only submitted the request.
    Async,
}

impl CallMode {
    /// Label value for the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMode::Sync => "sync",
            CallMode::Async => "async",
        }
    }
}

/// Labels of the timing histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MethodLabels {
    /// Method name, e.g. `check_tx`.
    pub method: String,
    /// `sync` or `async`.
    pub r#type: String,
}

/// Timing metrics for application connections.
#[derive(Clone)]
pub struct Metrics {
    method_timing: Family<MethodLabels, Histogram>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::nop()
    }
}

impl Metrics {
    /// Creates metrics registered in `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::nop();
        registry.register(
            METHOD_TIMING,
            "Time spent on application connection calls, by method and mode",
            metrics.method_timing.clone(),
        );
        metrics
    }

    /// Creates metrics that are recorded but never exported.
    pub fn nop() -> Self {
        Self {
            method_timing: Family::<MethodLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 16))
            }),
        }
    }

    /// Records one call.
    pub fn observe(&self, method: Method, mode: CallMode, seconds: f64) {
        self.histogram(method, mode).observe(seconds);
    }

    /// Starts timing a call. The sample is recorded when the timer drops,
    /// whatever the call's outcome.
    pub fn start(&self, method: Method, mode: CallMode) -> CallTimer {
        CallTimer {
            histogram: self.histogram(method, mode),
            started: Instant::now(),
        }
    }

    fn histogram(&self, method: Method, mode: CallMode) -> Histogram {
        let labels = MethodLabels {
            method: method.as_str().to_string(),
            r#type: mode.as_str().to_string(),
        };
        self.method_timing.get_or_create(&labels).clone()
    }
}

/// Records elapsed time into a histogram when dropped.
pub struct CallTimer {
    histogram: Histogram,
    started: Instant,
}

impl Drop for CallTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(registry: &Registry) -> String {
        let mut encoded = String::new();
        prometheus_client::encoding::text::encode(&mut encoded, registry).unwrap();
        encoded
    }

    #[test]
    fn test_timer_records_on_drop() {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        {
            let _timer = metrics.start(Method::CheckTx, CallMode::Async);
        }

        let encoded = encode(&registry);
        assert!(encoded.contains(
            "abci_connection_method_timing_seconds_count{method=\"check_tx\",type=\"async\"} 1"
        ));
        assert!(!encoded.contains("type=\"sync\""));
    }

    #[test]
    fn test_registered_family_is_exported() {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        metrics.observe(Method::Commit, CallMode::Sync, 0.25);

        let encoded = encode(&registry);
        assert!(encoded.contains(METHOD_TIMING));
        assert!(encoded.contains("method=\"commit\""));
        assert!(encoded.contains("type=\"sync\""));
    }
}
