// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the music operator.
//!
//! All metrics carry the namespace prefix `music_mixcorp_org_` (prometheus-safe
//! version of "music.mixcorp.org") and are served on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Pass outcomes, durations and requeues
//! - **Resource Lifecycle Metrics** - Child objects created, updated and deleted
//! - **Storage Metrics** - Resize, recreate and refused-shrink decisions
//! - **Error Metrics** - Failures by category
//!
//! # Example
//!
//! ```rust,no_run
//! use music_operator::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("MusicService", std::time::Duration::from_secs(1));
//! ```

use prometheus::core::Collector;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "music_mixcorp_org";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Register `collector` with [`METRICS_REGISTRY`]. Metric names are static, so a
/// failure here is a programming error.
fn registered<C: Collector + Clone + 'static>(collector: C) -> C {
    METRICS_REGISTRY
        .register(Box::new(collector.clone()))
        .unwrap();
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    registered(CounterVec::new(opts, labels).unwrap())
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Reconcile passes by resource type and outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Wall-clock duration of reconcile passes
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    registered(HistogramVec::new(opts, &["resource_type"]).unwrap())
});

/// Requeues by reason: `resync`, `not_ready` or `error`
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "requeues_total",
        "Total number of requeue operations by resource type and reason",
        &["resource_type", "reason"],
    )
});

// ============================================================================
// Child Resource Metrics
// ============================================================================

pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_created_total",
        "Child objects created by kind",
        &["resource_type"],
    )
});

pub static RESOURCES_UPDATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_updated_total",
        "Child objects updated by kind",
        &["resource_type"],
    )
});

pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_deleted_total",
        "Child objects deleted by kind",
        &["resource_type"],
    )
});

/// Ready application pods per `MusicService` (`namespace`, `name`)
pub static READY_REPLICAS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_ready_replicas"),
        "Ready application replicas per MusicService",
    );
    registered(GaugeVec::new(opts, &["namespace", "name"]).unwrap())
});

// ============================================================================
// Storage Metrics
// ============================================================================

/// Storage policy decisions
///
/// Labels:
/// - `tier`: `app` or `database`
/// - `action`: `expand`, `recreate` or `refuse_shrink`
pub static STORAGE_POLICY_ACTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "storage_policy_actions_total",
        "Storage policy actions by tier and action",
        &["tier", "action"],
    )
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed passes by resource type and `ReconcileError::category`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "errors_total",
        "Reconcile failures by resource type and error category",
        &["resource_type", "error_type"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

pub fn record_resource_updated(resource_type: &str) {
    RESOURCES_UPDATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

pub fn record_resource_deleted(resource_type: &str) {
    RESOURCES_DELETED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record a storage policy decision for a tier
pub fn record_storage_action(tier: &str, action: &str) {
    STORAGE_POLICY_ACTIONS_TOTAL
        .with_label_values(&[tier, action])
        .inc();
}

/// Publish the ready application replica count of a parent
pub fn set_ready_replicas(namespace: &str, name: &str, ready: i32) {
    READY_REPLICAS
        .with_label_values(&[namespace, name])
        .set(f64::from(ready));
}

pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
