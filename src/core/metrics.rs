// src/core/metrics.rs

//! Defines and registers Prometheus metrics for monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Registry ---
    /// The number of established backend sessions held by the registry.
    pub static ref LIVE_SESSIONS: Gauge =
        register_gauge!("spinelscope_live_sessions", "Number of established backend sessions.").unwrap();
    /// Every physical connect attempt, retries included.
    pub static ref CONNECT_ATTEMPTS_TOTAL: Counter =
        register_counter!("spinelscope_connect_attempts_total", "Total number of backend connect attempts.").unwrap();
    /// Connect attempts that exhausted their retries.
    pub static ref CONNECT_FAILURES_TOTAL: Counter =
        register_counter!("spinelscope_connect_failures_total", "Total number of backend connections that could not be established.").unwrap();
    /// Sessions dropped from the registry, lazily or on request.
    pub static ref SESSION_EVICTIONS_TOTAL: Counter =
        register_counter!("spinelscope_session_evictions_total", "Total number of evicted backend sessions.").unwrap();

    // --- Requests ---
    /// Business requests handled, labeled by operation and outcome.
    pub static ref REQUESTS_TOTAL: CounterVec =
        register_counter_vec!("spinelscope_requests_total", "Total number of handled requests.", &["operation", "outcome"]).unwrap();
    /// Best-effort lookups (memory footprint, per-key type) that failed and were swallowed.
    /// A failed `PFCOUNT` is not counted; it is how plain strings are told apart.
    pub static ref SWALLOWED_LOOKUP_FAILURES_TOTAL: CounterVec =
        register_counter_vec!("spinelscope_swallowed_lookup_failures_total", "Total number of best-effort lookup failures.", &["lookup"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
