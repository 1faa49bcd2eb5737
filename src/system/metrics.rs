//! Metrics collection and monitoring for Course Hub
//!
//! Prometheus counters registered once per process in the default registry
//! and rendered in text format at `/metrics`.

use crate::core::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};

/// Document store operation counters
pub struct StoreMetrics {
    /// Read operations (get, list, query)
    pub reads: IntCounter,
    /// Write operations (add, set, update, delete, batch)
    pub writes: IntCounter,
    /// Transactions started
    pub transactions: IntCounter,
    /// Operations that failed with a store error
    pub failures: IntCounter,
}

/// Storage layout resolver counters
pub struct ResolverMetrics {
    /// Probes by outcome (`hit`, `miss`, `error`)
    pub probes: IntCounterVec,
    /// Course ids guessed from module ids
    pub derived_course_ids: IntCounter,
}

/// HTTP API counters
pub struct ApiMetrics {
    /// Error responses by status class (`4xx`, `5xx`)
    pub errors: IntCounterVec,
}

/// Centralized metrics collection for all system components
pub struct Metrics {
    /// Store metrics
    pub store: StoreMetrics,
    /// Resolver metrics
    pub resolver: ResolverMetrics,
    /// API metrics
    pub api: ApiMetrics,
}

impl Metrics {
    /// Create new metrics instance
    fn new() -> Result<Self> {
        Ok(Self {
            store: StoreMetrics::new()?,
            resolver: ResolverMetrics::new()?,
            api: ApiMetrics::new()?,
        })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> = Lazy::new(|| {
            Metrics::new().expect("Failed to initialize metrics")
        });
        &INSTANCE
    }
}

impl StoreMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            reads: register_int_counter!("ch_store_reads_total", "Total number of document store reads")?,
            writes: register_int_counter!("ch_store_writes_total", "Total number of document store writes")?,
            transactions: register_int_counter!(
                "ch_store_transactions_total",
                "Total number of document store transactions"
            )?,
            failures: register_int_counter!(
                "ch_store_failures_total",
                "Total number of failed document store operations"
            )?,
        })
    }
}

impl ResolverMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            probes: register_int_counter_vec!(
                "ch_resolver_probes_total",
                "Storage layout probes by outcome",
                &["outcome"]
            )?,
            derived_course_ids: register_int_counter!(
                "ch_resolver_derived_course_ids_total",
                "Course ids guessed from module id prefixes"
            )?,
        })
    }
}

impl ApiMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            errors: register_int_counter_vec!(
                "ch_api_errors_total",
                "Error responses by status class",
                &["class"]
            )?,
        })
    }
}

/// Force registration so `/metrics` lists every series from the start
pub fn init_registry() {
    Lazy::force(&METRICS_READY);
}

static METRICS_READY: Lazy<()> = Lazy::new(|| {
    Metrics::global();
});

/// Render every registered metric in Prometheus text format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::core::Error::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_store_counters() {
        init_registry();
        Metrics::global().store.reads.inc();
        let text = render().unwrap();
        assert!(text.contains("ch_store_reads_total"));
    }
}
