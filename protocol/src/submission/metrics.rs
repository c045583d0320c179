//! # Submission Metrics
//!
//! Prometheus counters and a latency histogram for envelope submission.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. Exposing them
//! (HTTP endpoint, push gateway, log dump) is up to the embedding process.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Metric handles for a [`super::SubmissionOrchestrator`].
///
/// Cheap to clone; prometheus handles are reference counted.
#[derive(Clone)]
pub struct SubmissionMetrics {
    registry: Registry,
    /// Envelopes the ledger accepted.
    pub accepted_total: IntCounter,
    /// Envelopes the ledger definitively rejected.
    pub rejected_total: IntCounter,
    /// Envelopes that failed local validation and never left the process.
    pub invalid_total: IntCounter,
    /// Batch passes stopped by a connectivity failure.
    pub network_halts_total: IntCounter,
    /// Round-trip time of ledger submissions, in seconds.
    pub submit_latency_seconds: Histogram,
}

impl SubmissionMetrics {
    /// Creates and registers all metrics under the `aidrail` prefix.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("aidrail".into()), None)?;

        let accepted_total = IntCounter::new(
            "envelopes_accepted_total",
            "Total number of envelopes accepted by the ledger",
        )?;
        registry.register(Box::new(accepted_total.clone()))?;

        let rejected_total = IntCounter::new(
            "envelopes_rejected_total",
            "Total number of envelopes rejected by the ledger",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let invalid_total = IntCounter::new(
            "envelopes_invalid_total",
            "Total number of envelopes refused by local validation",
        )?;
        registry.register(Box::new(invalid_total.clone()))?;

        let network_halts_total = IntCounter::new(
            "batch_network_halts_total",
            "Total number of batch passes halted by network unavailability",
        )?;
        registry.register(Box::new(network_halts_total.clone()))?;

        let submit_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "submit_latency_seconds",
                "Ledger submission round-trip latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(submit_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            accepted_total,
            rejected_total,
            invalid_total,
            network_halts_total,
            submit_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
