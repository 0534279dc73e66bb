//! Run metrics and Prometheus export.
//!
//! This module provides:
//! - Outcome counters (auth, encrypt and decrypt failures)
//! - Check and iteration counters
//! - Per-operation latency tracking
//! - Prometheus text exposition
//! - HTTP endpoints for scraping during a run

#[cfg(feature = "metrics")]
mod http_server;

#[cfg(feature = "metrics")]
pub use http_server::*;

use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::{Deserialize, Serialize};

use crate::types::{Latency, Operation};

/// Latency buckets for request duration histograms, in seconds.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Highest latency tracked by the percentile histograms, in microseconds.
/// Longer requests are clamped to this value.
const MAX_TRACKED_LATENCY_US: u64 = 3_600_000_000;

/// Significant figures kept by the percentile histograms.
const LATENCY_SIGFIGS: u8 = 3;

/// Metrics shared by every virtual user of a run.
///
/// All counters only ever increase. Recording is lock-free except for the
/// per-operation latency histograms, which are updated under a short mutex
/// and have a fixed size for the whole run.
pub struct RunMetrics {
    registry: Registry,

    // Outcome counters
    pub auth_failures: IntCounter,
    pub encrypt_failures: IntCounter,
    pub decrypt_failures: IntCounter,

    // Scenario counters
    pub iterations: IntCounter,
    pub checks: IntCounterVec,

    // Request metrics
    pub requests: IntCounterVec,
    pub request_duration: HistogramVec,

    // Virtual users
    pub vus_active: IntGauge,

    latency: [Mutex<Histogram<u64>>; 3],
}

impl RunMetrics {
    /// Create a new metrics instance with all collectors registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let auth_failures = IntCounter::new(
            "vaultload_auth_failures_total",
            "Total number of failed AppRole logins",
        )?;
        let encrypt_failures = IntCounter::new(
            "vaultload_encrypt_failures_total",
            "Total number of failed transit encrypt calls",
        )?;
        let decrypt_failures = IntCounter::new(
            "vaultload_decrypt_failures_total",
            "Total number of failed transit decrypt calls",
        )?;

        let iterations = IntCounter::new(
            "vaultload_iterations_total",
            "Total number of completed scenario iterations",
        )?;
        let checks = IntCounterVec::new(
            Opts::new("vaultload_checks_total", "Round-trip checks by result"),
            &["result"],
        )?;

        let requests = IntCounterVec::new(
            Opts::new("vaultload_requests_total", "Requests by operation and outcome"),
            &["operation", "outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "vaultload_request_duration_seconds",
                "Request duration in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["operation"],
        )?;

        let vus_active = IntGauge::new(
            "vaultload_vus_active",
            "Number of currently running virtual users",
        )?;

        registry.register(Box::new(auth_failures.clone()))?;
        registry.register(Box::new(encrypt_failures.clone()))?;
        registry.register(Box::new(decrypt_failures.clone()))?;
        registry.register(Box::new(iterations.clone()))?;
        registry.register(Box::new(checks.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(vus_active.clone()))?;

        let latency = [latency_histogram()?, latency_histogram()?, latency_histogram()?];

        Ok(Self {
            registry,
            auth_failures,
            encrypt_failures,
            decrypt_failures,
            iterations,
            checks,
            requests,
            request_duration,
            vus_active,
            latency,
        })
    }

    /// Encode metrics to Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }

    /// Record a completed request.
    pub fn record_request(&self, op: Operation, elapsed: Duration, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.requests
            .with_label_values(&[op.as_str(), outcome])
            .inc();
        self.request_duration
            .with_label_values(&[op.as_str()])
            .observe(elapsed.as_secs_f64());
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency[op.index()].lock().saturating_record(micros.max(1));
    }

    /// Increment the failure counter for an operation.
    pub fn record_failure(&self, op: Operation) {
        match op {
            Operation::Login => self.auth_failures.inc(),
            Operation::Encrypt => self.encrypt_failures.inc(),
            Operation::Decrypt => self.decrypt_failures.inc(),
        }
    }

    /// Record the result of the round-trip check.
    pub fn record_check(&self, passed: bool) {
        let result = if passed { "pass" } else { "fail" };
        self.checks.with_label_values(&[result]).inc();
    }

    /// Record a finished iteration.
    pub fn record_iteration(&self) {
        self.iterations.inc();
    }

    /// Latency statistics for an operation, if any request was made.
    pub fn latency(&self, op: Operation) -> Option<Latency> {
        Latency::from_histogram(&self.latency[op.index()].lock())
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            auth_failures: self.auth_failures.get(),
            encrypt_failures: self.encrypt_failures.get(),
            decrypt_failures: self.decrypt_failures.get(),
            iterations: self.iterations.get(),
            checks_passed: self.checks.with_label_values(&["pass"]).get(),
            checks_failed: self.checks.with_label_values(&["fail"]).get(),
            vus_active: self.vus_active.get(),
        }
    }
}

fn latency_histogram() -> Result<Mutex<Histogram<u64>>, prometheus::Error> {
    Histogram::new_with_bounds(1, MAX_TRACKED_LATENCY_US, LATENCY_SIGFIGS)
        .map(Mutex::new)
        .map_err(|e| prometheus::Error::Msg(format!("latency histogram: {e:?}")))
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create run metrics")
    }
}

impl std::fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunMetrics")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub auth_failures: u64,
    pub encrypt_failures: u64,
    pub decrypt_failures: u64,
    pub iterations: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub vus_active: i64,
}

impl MetricsSnapshot {
    /// Sum of the three failure counters.
    pub fn total_failures(&self) -> u64 {
        self.auth_failures + self.encrypt_failures + self.decrypt_failures
    }

    /// Fraction of checks that passed, if any ran.
    pub fn check_pass_rate(&self) -> Option<f64> {
        let total = self.checks_passed + self.checks_failed;
        (total > 0).then(|| self.checks_passed as f64 / total as f64)
    }
}
