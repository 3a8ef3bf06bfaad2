//! Observability infrastructure for the check engine
//!
//! Provides:
//! - Prometheus metrics (sections parsed, services discovered, check outcomes, check latency)
//! - Structured logging of engine events with tracing

use crate::models::State;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for check durations (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    sections_parsed: IntCounterVec,
    sections_absent: IntCounterVec,
    services_discovered: IntCounterVec,
    check_results: IntCounterVec,
    check_pending: IntCounterVec,
    check_crashes: IntCounterVec,
    items_missing: IntCounter,
    check_duration_seconds: Histogram,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            sections_parsed: register_int_counter_vec!(
                "check_engine_sections_parsed_total",
                "Raw sections handed to a parse function",
                &["section"]
            )
            .expect("Failed to register sections_parsed"),

            sections_absent: register_int_counter_vec!(
                "check_engine_sections_absent_total",
                "Raw sections whose parse function found nothing usable",
                &["section"]
            )
            .expect("Failed to register sections_absent"),

            services_discovered: register_int_counter_vec!(
                "check_engine_services_discovered_total",
                "Services yielded by discovery",
                &["check"]
            )
            .expect("Failed to register services_discovered"),

            check_results: register_int_counter_vec!(
                "check_engine_check_results_total",
                "Completed check evaluations by aggregate state",
                &["check", "state"]
            )
            .expect("Failed to register check_results"),

            check_pending: register_int_counter_vec!(
                "check_engine_check_pending_total",
                "Check evaluations that produced no result this cycle",
                &["check"]
            )
            .expect("Failed to register check_pending"),

            check_crashes: register_int_counter_vec!(
                "check_engine_check_crashes_total",
                "Check evaluations that failed with an error",
                &["check"]
            )
            .expect("Failed to register check_crashes"),

            items_missing: register_int_counter!(
                "check_engine_items_missing_total",
                "Check evaluations without current data for their item"
            )
            .expect("Failed to register items_missing"),

            check_duration_seconds: register_histogram!(
                "check_engine_check_duration_seconds",
                "Time spent in check functions",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register check_duration_seconds"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn inc_section_parsed(&self, section: &str, present: bool) {
        self.inner()
            .sections_parsed
            .with_label_values(&[section])
            .inc();
        if !present {
            self.inner()
                .sections_absent
                .with_label_values(&[section])
                .inc();
        }
    }

    pub fn add_services_discovered(&self, check: &str, count: usize) {
        self.inner()
            .services_discovered
            .with_label_values(&[check])
            .inc_by(count as u64);
    }

    pub fn inc_check_result(&self, check: &str, state: State) {
        let state = state.to_string();
        self.inner()
            .check_results
            .with_label_values(&[check, state.as_str()])
            .inc();
    }

    pub fn inc_check_pending(&self, check: &str) {
        self.inner().check_pending.with_label_values(&[check]).inc();
    }

    pub fn inc_check_crash(&self, check: &str) {
        self.inner().check_crashes.with_label_values(&[check]).inc();
    }

    pub fn inc_item_missing(&self) {
        self.inner().items_missing.inc();
    }

    pub fn observe_check_duration(&self, duration_secs: f64) {
        self.inner().check_duration_seconds.observe(duration_secs);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn log_discovery(&self, check: &str, services: usize) {
        info!(
            event = "services_discovered",
            host = %self.host_name,
            check = %check,
            services = services,
            "Discovered services"
        );
    }

    pub fn log_check_result(&self, check: &str, item: Option<&str>, state: State, summary: &str) {
        match state {
            State::Ok => info!(
                event = "check_result",
                host = %self.host_name,
                check = %check,
                item = ?item,
                state = %state,
                summary = %summary,
                "Check completed"
            ),
            _ => warn!(
                event = "check_result",
                host = %self.host_name,
                check = %check,
                item = ?item,
                state = %state,
                summary = %summary,
                "Check completed with problems"
            ),
        }
    }

    pub fn log_pending(&self, check: &str, item: Option<&str>, reason: &str) {
        info!(
            event = "check_pending",
            host = %self.host_name,
            check = %check,
            item = ?item,
            reason = %reason,
            "No result this cycle"
        );
    }

    pub fn log_item_missing(&self, check: &str, item: Option<&str>) {
        info!(
            event = "item_missing",
            host = %self.host_name,
            check = %check,
            item = ?item,
            "Item not found in current data"
        );
    }

    pub fn log_check_crash(&self, check: &str, item: Option<&str>, error: &dyn std::error::Error) {
        error!(
            event = "check_crashed",
            host = %self.host_name,
            check = %check,
            item = ?item,
            error = %error,
            "Check function failed"
        );
    }
}
