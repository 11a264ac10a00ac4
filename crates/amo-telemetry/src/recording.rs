// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use amo_core::{AmoError, ReasonCode, TelemetryRecord};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Register all AMO metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("amo_routes_total", "Routing decisions that reached a terminal state");
    describe_counter!(
        "amo_downgrades_total",
        "Routing decisions downgraded by the cost guard"
    );
    describe_counter!(
        "amo_fallbacks_total",
        "Requests retried at the standard tier after a pre-commit failure"
    );
    describe_counter!(
        "amo_telemetry_dropped_total",
        "Telemetry records dropped because the queue was full"
    );
    describe_histogram!(
        "amo_decision_latency_seconds",
        "Time spent classifying and selecting a tier"
    );
    describe_histogram!(
        "amo_response_latency_seconds",
        "Wall time from first provider attempt to terminal state"
    );
}

/// Install the Prometheus recorder globally and register descriptions.
///
/// Only one recorder can be installed per process.
pub fn install_prometheus() -> Result<PrometheusHandle, AmoError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AmoError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
    register_metrics();
    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Record the metrics for one terminal routing outcome.
pub fn record_route(record: &TelemetryRecord) {
    metrics::counter!(
        "amo_routes_total",
        "tier" => record.effective_tier.to_string(),
        "intent" => record.intent.to_string(),
        "outcome" => record.outcome.to_string()
    )
    .increment(1);

    if matches!(
        record.reason_code,
        ReasonCode::CapExceeded | ReasonCode::RateLimited
    ) {
        metrics::counter!("amo_downgrades_total", "reason" => record.reason_code.to_string())
            .increment(1);
    }

    if record.fallback_applied {
        metrics::counter!("amo_fallbacks_total").increment(1);
    }

    metrics::histogram!("amo_decision_latency_seconds").record(record.decision_time.as_secs_f64());
    if let Some(response_time) = record.response_time {
        metrics::histogram!(
            "amo_response_latency_seconds",
            "tier" => record.effective_tier.to_string()
        )
        .record(response_time.as_secs_f64());
    }
}

/// Record one dropped telemetry record.
pub fn record_telemetry_dropped() {
    metrics::counter!("amo_telemetry_dropped_total").increment(1);
}
