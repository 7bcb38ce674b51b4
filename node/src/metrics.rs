//! Prometheus metrics for the CCN node.
//!
//! Counters, gauges, and a latency histogram covering the admission
//! pipeline. The [`NodeMetrics`] struct owns a dedicated [`Registry`] that
//! can be encoded into the Prometheus text exposition format on demand.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Candidate messages that entered the pipeline.
    pub candidates_processed: IntCounter,
    /// Messages admitted and applied.
    pub messages_applied: IntCounter,
    /// Messages permanently rejected.
    pub messages_rejected: IntCounter,
    /// Transient failures sent back to the retry queue.
    pub messages_retried: IntCounter,
    /// Confirmations recorded against messages.
    pub confirmations_recorded: IntCounter,
    /// Chain transactions expanded into candidates.
    pub txs_expanded: IntCounter,
    /// Chain transactions dropped for undecodable payloads.
    pub txs_dropped: IntCounter,
    /// Gossip payloads received.
    pub gossip_received: IntCounter,
    /// Gossip payloads rejected as invalid envelopes.
    pub gossip_invalid: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Pending messages awaiting admission.
    pub pending_backlog: IntGauge,
    /// Pending chain transactions awaiting expansion.
    pub pending_tx_backlog: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time one admission attempt spends in the pipeline, in seconds.
    pub admission_seconds: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .expect("metric registration only fails on duplicate names")
        };
        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(Opts::new(name, help), registry)
                .expect("metric registration only fails on duplicate names")
        };

        let admission_seconds = register_histogram_with_registry!(
            HistogramOpts::new("ccn_admission_seconds", "Pipeline time per admission attempt")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            registry
        )
        .expect("metric registration only fails on duplicate names");

        Self {
            candidates_processed: counter(
                "ccn_candidates_processed_total",
                "Candidate messages that entered the pipeline",
            ),
            messages_applied: counter("ccn_messages_applied_total", "Messages admitted and applied"),
            messages_rejected: counter(
                "ccn_messages_rejected_total",
                "Messages permanently rejected",
            ),
            messages_retried: counter(
                "ccn_messages_retried_total",
                "Transient failures sent to the retry queue",
            ),
            confirmations_recorded: counter(
                "ccn_confirmations_recorded_total",
                "Confirmations recorded against messages",
            ),
            txs_expanded: counter(
                "ccn_txs_expanded_total",
                "Chain transactions expanded into candidates",
            ),
            txs_dropped: counter(
                "ccn_txs_dropped_total",
                "Chain transactions dropped as undecodable",
            ),
            gossip_received: counter("ccn_gossip_received_total", "Gossip payloads received"),
            gossip_invalid: counter(
                "ccn_gossip_invalid_total",
                "Gossip payloads rejected as invalid envelopes",
            ),
            pending_backlog: gauge("ccn_pending_backlog", "Pending messages awaiting admission"),
            pending_tx_backlog: gauge(
                "ccn_pending_tx_backlog",
                "Pending chain transactions awaiting expansion",
            ),
            admission_seconds,
            registry,
        }
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(%err, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = NodeMetrics::new();
        assert_eq!(metrics.messages_applied.get(), 0);
        metrics.messages_applied.inc();
        assert_eq!(metrics.messages_applied.get(), 1);
    }

    #[test]
    fn encode_includes_metric_names() {
        let metrics = NodeMetrics::new();
        metrics.candidates_processed.inc();
        let text = metrics.encode();
        assert!(text.contains("ccn_candidates_processed_total"));
        assert!(text.contains("ccn_pending_backlog"));
    }
}
