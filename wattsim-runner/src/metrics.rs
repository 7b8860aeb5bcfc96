// Wattsim Runner - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the simulator.
//!
//! This module defines all Prometheus metrics exposed by the runner
//! and provides functions to update them from cycle reports.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter, CounterVec,
    Encoder, Gauge, GaugeVec, TextEncoder,
};
use wattsim::{AggregationReport, SweepReport, Tier, UpdateReport};

lazy_static! {
    // ============================================================
    // Simulation Metrics
    // ============================================================

    /// Readings generated, labeled by tier.
    pub static ref READINGS_TOTAL: CounterVec = register_counter_vec!(
        "wattsim_readings_total",
        "Readings generated and buffered",
        &["tier"]
    ).unwrap();

    /// Latest reading per device, in kWh.
    pub static ref DEVICE_READING_KWH: GaugeVec = register_gauge_vec!(
        "wattsim_device_reading_kwh",
        "Latest simulated reading per device (kWh)",
        &["device"]
    ).unwrap();

    /// Devices listed by the store in the last update cycle.
    pub static ref DEVICES: Gauge = register_gauge!(
        "wattsim_devices",
        "Devices listed by the store in the last update cycle"
    ).unwrap();

    /// Readings waiting for the next aggregation.
    pub static ref BUFFERED_READINGS: Gauge = register_gauge!(
        "wattsim_buffered_readings",
        "Readings buffered across all devices"
    ).unwrap();

    // ============================================================
    // Alert and Suggestion Metrics
    // ============================================================

    /// Alerts emitted, labeled by predominant tier.
    pub static ref ALERTS_TOTAL: CounterVec = register_counter_vec!(
        "wattsim_alerts_total",
        "Aggregated alerts emitted",
        &["tier"]
    ).unwrap();

    /// Suggestions emitted, labeled by tier.
    pub static ref SUGGESTIONS_TOTAL: CounterVec = register_counter_vec!(
        "wattsim_suggestions_total",
        "Suggestions emitted",
        &["tier"]
    ).unwrap();

    /// Suggestions removed by retention sweeps.
    pub static ref SUGGESTIONS_PURGED_TOTAL: Counter = register_counter!(
        "wattsim_suggestions_purged_total",
        "Suggestions removed by retention sweeps"
    ).unwrap();

    // ============================================================
    // Runner Metrics
    // ============================================================

    /// Failed store operations, labeled by operation.
    pub static ref STORE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "wattsim_store_errors_total",
        "Failed document store operations",
        &["operation"]
    ).unwrap();

    /// Duration of the last run of each cycle.
    pub static ref CYCLE_DURATION_SECONDS: GaugeVec = register_gauge_vec!(
        "wattsim_cycle_duration_seconds",
        "Duration of the last run of each cycle",
        &["cycle"]
    ).unwrap();
}

/// Store operations tracked by [`STORE_ERRORS_TOTAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    UpdateReading,
    AppendHistory,
    AppendAlert,
    AppendSuggestion,
    Purge,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::List => "list",
            StoreOperation::UpdateReading => "update_reading",
            StoreOperation::AppendHistory => "append_history",
            StoreOperation::AppendAlert => "append_alert",
            StoreOperation::AppendSuggestion => "append_suggestion",
            StoreOperation::Purge => "purge",
        }
    }
}

fn record_store_errors(op: StoreOperation, count: usize) {
    if count > 0 {
        STORE_ERRORS_TOTAL
            .with_label_values(&[op.as_str()])
            .inc_by(count as f64);
    }
}

/// Update metrics from an update cycle report.
pub fn record_update(report: &UpdateReport) {
    if report.listing_failed {
        record_store_errors(StoreOperation::List, 1);
        return;
    }

    DEVICES.set(report.devices as f64);
    for tier in Tier::ALL {
        let n = report.tiers.get(tier);
        if n > 0 {
            READINGS_TOTAL
                .with_label_values(&[tier.as_str()])
                .inc_by(n as f64);
        }
    }
    for (device_id, reading) in &report.readings {
        DEVICE_READING_KWH
            .with_label_values(&[device_id.as_str()])
            .set(reading.value);
    }
    record_store_errors(StoreOperation::UpdateReading, report.failed_updates);
    record_store_errors(StoreOperation::AppendHistory, report.failed_history);
}

/// Update metrics from an aggregation cycle report.
pub fn record_aggregation(report: &AggregationReport) {
    if report.listing_failed {
        record_store_errors(StoreOperation::List, 1);
        return;
    }

    for alert in &report.alerts {
        ALERTS_TOTAL.with_label_values(&[alert.tier.as_str()]).inc();
    }
    for suggestion in &report.suggestions {
        SUGGESTIONS_TOTAL
            .with_label_values(&[suggestion.tier.as_str()])
            .inc();
    }
    record_store_errors(StoreOperation::AppendAlert, report.failed_alerts);
    record_store_errors(StoreOperation::AppendSuggestion, report.failed_suggestions);
}

/// Update metrics from a retention sweep report.
pub fn record_sweep(report: &SweepReport) {
    if report.failed {
        record_store_errors(StoreOperation::Purge, 1);
    } else {
        SUGGESTIONS_PURGED_TOTAL.inc_by(report.purged as f64);
    }
}

/// Set the duration of the last run of a cycle.
pub fn record_cycle_duration(cycle: &str, secs: f64) {
    CYCLE_DURATION_SECONDS.with_label_values(&[cycle]).set(secs);
}

/// Set the number of buffered readings.
pub fn update_buffered(total: usize) {
    BUFFERED_READINGS.set(total as f64);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
