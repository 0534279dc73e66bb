//! Core types used throughout vaultload.

use std::fmt;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Identifier of a virtual user within a run (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VuId(pub u32);

impl fmt::Display for VuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vu-{}", self.0)
    }
}

/// A call against the secrets service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Login,
    Encrypt,
    Decrypt,
}

impl Operation {
    pub const ALL: [Self; 3] = [Self::Login, Self::Encrypt, Self::Decrypt];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Login => 0,
            Self::Encrypt => 1,
            Self::Decrypt => 2,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication state of a virtual user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    /// No token held; the next iteration logs in.
    Unauthenticated,
    /// Token held for the rest of the run.
    Authenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Latency measurement with statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    /// Number of samples
    pub count: usize,
    /// Minimum observed latency
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Average latency
    #[serde(with = "humantime_serde")]
    pub avg: Duration,
    /// Median latency
    #[serde(with = "humantime_serde")]
    pub p50: Duration,
    /// 95th percentile latency
    #[serde(with = "humantime_serde")]
    pub p95: Duration,
    /// 99th percentile latency
    #[serde(with = "humantime_serde")]
    pub p99: Duration,
    /// Maximum observed latency
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Latency {
    /// Summarize a histogram of latencies recorded in microseconds.
    pub fn from_histogram(hist: &Histogram<u64>) -> Option<Self> {
        if hist.len() == 0 {
            return None;
        }

        let at = |q: f64| Duration::from_micros(hist.value_at_quantile(q));

        Some(Self {
            count: hist.len() as usize,
            min: Duration::from_micros(hist.min()),
            avg: Duration::from_secs_f64(hist.mean() / 1_000_000.0),
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
            max: Duration::from_micros(hist.max()),
        })
    }

    pub fn as_human_readable(&self) -> String {
        format!(
            "avg={:.1}ms, p95={:.1}ms, p99={:.1}ms",
            self.avg.as_secs_f64() * 1000.0,
            self.p95.as_secs_f64() * 1000.0,
            self.p99.as_secs_f64() * 1000.0
        )
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}ms", self.avg.as_secs_f64() * 1000.0)
    }
}
