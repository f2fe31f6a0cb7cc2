//! Prometheus metrics for the cache client

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

/// Client-side metrics, one instance per `CacheClient`
pub struct Metrics {
    pub registry: Registry,

    // Operation counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_add: IntCounter,
    pub cmd_replace: IntCounter,
    pub cmd_append: IntCounter,
    pub cmd_delete: IntCounter,
    pub cmd_incr: IntCounter,
    pub cmd_decr: IntCounter,
    pub cmd_counter_init: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Pool
    pub handles_in_use: IntGauge,
    pub pool_timeouts: IntCounter,

    // Latency histograms
    pub cmd_latency: Histogram,

    // Error counters
    pub local_rejections: IntCounter,
    pub store_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance with its own registry
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            let c = IntCounter::new(name, help).expect("valid metric definition");
            registry
                .register(Box::new(c.clone()))
                .expect("metric registered once");
            c
        };

        let cmd_get = counter("mcdcache_cmd_get_total", "Total get operations");
        let cmd_set = counter("mcdcache_cmd_set_total", "Total set operations");
        let cmd_add = counter("mcdcache_cmd_add_total", "Total add operations");
        let cmd_replace = counter("mcdcache_cmd_replace_total", "Total replace operations");
        let cmd_append = counter("mcdcache_cmd_append_total", "Total append operations");
        let cmd_delete = counter("mcdcache_cmd_delete_total", "Total delete operations");
        let cmd_incr = counter("mcdcache_cmd_incr_total", "Total counter increments and reads");
        let cmd_decr = counter("mcdcache_cmd_decr_total", "Total counter decrements");
        let cmd_counter_init = counter(
            "mcdcache_cmd_counter_init_total",
            "Total counter initializations",
        );

        let get_hits = counter("mcdcache_get_hits_total", "Total get hits");
        let get_misses = counter("mcdcache_get_misses_total", "Total get misses");

        let pool_timeouts = counter(
            "mcdcache_pool_timeouts_total",
            "Operations abandoned waiting for a pooled connection",
        );
        let local_rejections = counter(
            "mcdcache_local_rejections_total",
            "Operations refused before contacting the store",
        );
        let store_errors = counter(
            "mcdcache_store_errors_total",
            "Operations that failed at the store or on the wire",
        );

        let handles_in_use = IntGauge::new(
            "mcdcache_pool_handles_in_use",
            "Pooled store handles currently checked out",
        )
        .expect("valid metric definition");
        registry
            .register(Box::new(handles_in_use.clone()))
            .expect("metric registered once");

        let cmd_latency = Histogram::with_opts(
            HistogramOpts::new(
                "mcdcache_cmd_latency_seconds",
                "Operation latency in seconds, pool wait included",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("valid metric definition");
        registry
            .register(Box::new(cmd_latency.clone()))
            .expect("metric registered once");

        Self {
            registry,
            cmd_get,
            cmd_set,
            cmd_add,
            cmd_replace,
            cmd_append,
            cmd_delete,
            cmd_incr,
            cmd_decr,
            cmd_counter_init,
            get_hits,
            get_misses,
            handles_in_use,
            pool_timeouts,
            cmd_latency,
            local_rejections,
            store_errors,
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {e}");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
