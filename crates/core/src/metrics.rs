//! Prometheus metrics for the notarization engine.
//!
//! This module provides metrics for:
//! - Uploads (by result)
//! - Status and log queries (by resource and disposition)
//! - Poll sleeps (by cadence)
//! - Final artifact dispositions

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Submission Metrics
// =============================================================================

/// Uploads total by result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notary_uploads_total", "Total artifact uploads"),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Upload duration in seconds.
pub static UPLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("notary_upload_duration_seconds", "Duration of artifact uploads")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Polling Metrics
// =============================================================================

/// Remote queries by resource and result.
pub static QUERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notary_queries_total", "Total status and log queries"),
        &["resource", "result"], // result: "ok", "queued_not_found", "transient_network", "terminal"
    )
    .unwrap()
});

/// Poll sleeps by cadence.
pub static POLL_SLEEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notary_poll_sleeps_total", "Total backoff sleeps between polls"),
        &["cadence"], // "slow", "fast"
    )
    .unwrap()
});

// =============================================================================
// Outcome Metrics
// =============================================================================

/// Final artifact dispositions.
pub static ARTIFACT_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notary_artifact_outcomes_total", "Final artifact dispositions"),
        &["outcome"], // "accepted", "rejected", "errored"
    )
    .unwrap()
});

/// Time from submission start to final disposition.
pub static ARTIFACT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "notary_artifact_duration_seconds",
            "Duration from submission to final disposition",
        )
        .buckets(vec![
            60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(UPLOAD_DURATION.clone()),
        Box::new(QUERIES_TOTAL.clone()),
        Box::new(POLL_SLEEPS.clone()),
        Box::new(ARTIFACT_OUTCOMES.clone()),
        Box::new(ARTIFACT_DURATION.clone()),
    ]
}
