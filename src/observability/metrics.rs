//! # Metrics
//!
//! Prometheus metrics for monitoring the service.
//!
//! ## Metrics Exposed
//!
//! - `sealed_secret_submissions_total{outcome}` - Submissions by outcome (`sealed`, `rejected`, `failed`)
//! - `sealed_secret_stage_failures_total{stage}` - Environment failures by last stage reached
//! - `sealed_secret_tool_duration_seconds{tool}` - Duration of kubectl/kubeseal invocations
//! - `sealed_secret_namespace_fallbacks_total` - Namespace listings that fell back to `default`

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SUBMISSIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sealed_secret_submissions_total",
            "Total number of submissions by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create SUBMISSIONS_TOTAL metric - this should never happen")
});

static STAGE_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sealed_secret_stage_failures_total",
            "Total number of failed submissions by last stage reached",
        ),
        &["stage"],
    )
    .expect("Failed to create STAGE_FAILURES_TOTAL metric - this should never happen")
});

static TOOL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "sealed_secret_tool_duration_seconds",
            "Duration of external tool invocations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["tool"],
    )
    .expect("Failed to create TOOL_DURATION metric - this should never happen")
});

static NAMESPACE_FALLBACKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sealed_secret_namespace_fallbacks_total",
        "Total number of namespace listings that fell back to the default namespace",
    )
    .expect("Failed to create NAMESPACE_FALLBACKS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SUBMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STAGE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOOL_DURATION.clone()))?;
    REGISTRY.register(Box::new(NAMESPACE_FALLBACKS_TOTAL.clone()))?;

    Ok(())
}

pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn increment_submissions(outcome: &str) {
    SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_stage_failures(stage: &str) {
    STAGE_FAILURES_TOTAL.with_label_values(&[stage]).inc();
}

pub fn observe_tool_duration(tool: &str, duration_secs: f64) {
    TOOL_DURATION.with_label_values(&[tool]).observe(duration_secs);
}

pub fn increment_namespace_fallbacks() {
    NAMESPACE_FALLBACKS_TOTAL.inc();
}
