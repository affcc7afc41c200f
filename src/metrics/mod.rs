//! Metrics collection for observability

use crate::candidates::PairOrigin;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics collector
pub static ENGINE_METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Candidate generation
    pub candidates_generated: CounterVec,
    pub facts_skipped: Counter,

    // Adjudication
    pub adjudications: CounterVec,
    pub batch_duration: Histogram,

    // Repetition
    pub repetition_clusters: Counter,
}

impl Metrics {
    /// Create a new collector on its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let candidates_generated = register_counter_vec_with_registry!(
            Opts::new("fce_candidates_total", "Candidate pairs emitted after aggregation"),
            &["origin"],
            registry
        )?;

        let facts_skipped = register_counter_with_registry!(
            Opts::new("fce_facts_skipped_total", "Facts excluded from similarity retrieval"),
            registry
        )?;

        let adjudications = register_counter_vec_with_registry!(
            Opts::new("fce_adjudications_total", "Adjudicated candidate pairs by outcome"),
            &["status"],
            registry
        )?;

        let batch_duration = register_histogram_with_registry!(
            "fce_batch_duration_seconds",
            "Wall time of one adjudication batch in seconds",
            registry
        )?;

        let repetition_clusters = register_counter_with_registry!(
            Opts::new("fce_repetition_clusters_total", "Repetition clusters emitted"),
            registry
        )?;

        Ok(Self {
            registry,
            candidates_generated,
            facts_skipped,
            adjudications,
            batch_duration,
            repetition_clusters,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_candidate(&self, origin: PairOrigin) {
        self.candidates_generated.with_label_values(&[origin.as_str()]).inc();
    }

    pub fn record_skipped(&self, count: usize) {
        self.facts_skipped.inc_by(count as f64);
    }

    /// Record one adjudication outcome ("resolved", "failed", "cancelled")
    pub fn record_adjudication(&self, status: &str) {
        self.adjudications.with_label_values(&[status]).inc();
    }

    pub fn record_batch(&self, seconds: f64) {
        self.batch_duration.observe(seconds);
    }

    pub fn record_repetition_clusters(&self, count: usize) {
        self.repetition_clusters.inc_by(count as f64);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
