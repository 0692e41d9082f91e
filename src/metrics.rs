// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters/histograms for the world-state stack, registered once against a
//! caller-supplied [`Registry`] and retrieved afterwards through a process-wide singleton.

use once_cell::sync::OnceCell;
use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, Registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
};
use std::sync::Arc;

const LATENCY_SEC_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug)]
pub struct WorldStateMetrics {
    pub node_store_ops_total: IntCounterVec,
    pub node_store_op_bytes: HistogramVec,
    pub node_store_op_latency_seconds: HistogramVec,
    pub cache_pending_size: IntGaugeVec,
    pub persist_latency_seconds: HistogramVec,
    pub staging_transitions_total: IntCounterVec,
    pub code_ref_count: IntGaugeVec,
}

impl WorldStateMetrics {
    fn new(registry: &Registry) -> Self {
        WorldStateMetrics {
            node_store_ops_total: register_int_counter_vec_with_registry!(
                "world_state_node_store_ops_total",
                "Node store operations by kind (get/put/remove/exists/scan)",
                &["op"],
                registry,
            )
            .unwrap(),
            node_store_op_bytes: register_histogram_vec_with_registry!(
                "world_state_node_store_op_bytes",
                "Bytes read or written per node store operation",
                &["op"],
                prometheus::exponential_buckets(1.0, 4.0, 15)
                    .unwrap()
                    .to_vec(),
                registry,
            )
            .unwrap(),
            node_store_op_latency_seconds: register_histogram_vec_with_registry!(
                "world_state_node_store_op_latency_seconds",
                "Node store operation latency in seconds",
                &["op"],
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            cache_pending_size: register_int_gauge_vec_with_registry!(
                "world_state_cache_pending_size",
                "Number of entries currently buffered in a CachedSMT's pending map",
                &["tree"],
                registry,
            )
            .unwrap(),
            persist_latency_seconds: register_histogram_vec_with_registry!(
                "world_state_persist_latency_seconds",
                "Latency of folding a cache's pending map into its persisted trie",
                &["tree"],
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            staging_transitions_total: register_int_counter_vec_with_registry!(
                "world_state_staging_transitions_total",
                "Staging layer commit/rollback transitions",
                &["transition"],
                registry,
            )
            .unwrap(),
            code_ref_count: register_int_gauge_vec_with_registry!(
                "world_state_code_ref_count",
                "Observed reference count of the most recently touched code record",
                &["code_hash"],
                registry,
            )
            .unwrap(),
        }
    }
}

static METRICS_ONCE: OnceCell<Arc<WorldStateMetrics>> = OnceCell::new();

/// Registers the metrics against `registry`. Only the first call wins; later calls with a
/// different registry are logged and ignored, mirroring the one-writer discipline of the rest of
/// the stack.
pub fn init(registry: &Registry) -> &'static Arc<WorldStateMetrics> {
    if METRICS_ONCE.set(Arc::new(WorldStateMetrics::new(registry))).is_err() {
        tracing::warn!("world-state metrics registry already initialized; ignoring");
    }
    METRICS_ONCE.get().expect("metrics set above")
}

pub fn get() -> Option<&'static Arc<WorldStateMetrics>> {
    METRICS_ONCE.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let registry = Registry::new();
        let first = init(&registry);
        let second = init(&Registry::new());
        assert!(std::ptr::eq(first.as_ref(), second.as_ref()));
    }
}
