//! Run report.

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::MetricsSnapshot;
use crate::types::{Latency, Operation};
use crate::util::format_duration;

/// Latency statistics for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLatency {
    pub operation: Operation,
    pub latency: Option<Latency>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target: String,
    pub transit_key: String,
    pub vus: u32,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub counters: MetricsSnapshot,
    pub latency: Vec<OperationLatency>,
}

impl RunReport {
    /// True when no call failed and every check passed.
    pub fn exit_ok(&self) -> bool {
        self.counters.total_failures() == 0 && self.counters.checks_failed == 0
    }

    /// Completed iterations per second of wall time.
    pub fn iterations_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.iterations as f64 / secs
        } else {
            0.0
        }
    }

    /// Failure count for an operation.
    pub fn failures(&self, op: Operation) -> u64 {
        match op {
            Operation::Login => self.counters.auth_failures,
            Operation::Encrypt => self.counters.encrypt_failures,
            Operation::Decrypt => self.counters.decrypt_failures,
        }
    }

    /// Per-operation table of request counts, failures and latency.
    pub fn operations_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Operation", "Requests", "Failures", "Min", "Avg", "p50", "p95", "p99", "Max",
            ]);

        for entry in &self.latency {
            let failures = self.failures(entry.operation);
            let mut row = vec![Cell::new(entry.operation)];

            match entry.latency {
                Some(ref l) => {
                    row.push(Cell::new(l.count).set_alignment(CellAlignment::Right));
                    row.push(Cell::new(failures).set_alignment(CellAlignment::Right));
                    for d in [l.min, l.avg, l.p50, l.p95, l.p99, l.max] {
                        row.push(Cell::new(format_duration(d)).set_alignment(CellAlignment::Right));
                    }
                }
                None => {
                    row.push(Cell::new(0).set_alignment(CellAlignment::Right));
                    row.push(Cell::new(failures).set_alignment(CellAlignment::Right));
                    row.extend((0..6).map(|_| Cell::new("-")));
                }
            }

            table.add_row(row);
        }

        table
    }

    /// Run-level totals table.
    pub fn summary_table(&self) -> Table {
        let pass_rate = self
            .counters
            .check_pass_rate()
            .map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r * 100.0));

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec!["Run".to_string(), self.run_id.to_string()]);
        table.add_row(vec!["Target".to_string(), self.target.clone()]);
        table.add_row(vec!["Transit key".to_string(), self.transit_key.clone()]);
        table.add_row(vec!["Virtual users".to_string(), self.vus.to_string()]);
        table.add_row(vec!["Elapsed".to_string(), format_duration(self.elapsed)]);
        table.add_row(vec![
            "Iterations".to_string(),
            format!(
                "{} ({:.2}/s)",
                self.counters.iterations,
                self.iterations_per_sec()
            ),
        ]);
        table.add_row(vec![
            "Checks".to_string(),
            format!(
                "{} passed, {} failed ({pass_rate})",
                self.counters.checks_passed, self.counters.checks_failed
            ),
        ]);
        table.add_row(vec![
            "auth_failures".to_string(),
            self.counters.auth_failures.to_string(),
        ]);
        table.add_row(vec![
            "encrypt_failures".to_string(),
            self.counters.encrypt_failures.to_string(),
        ]);
        table.add_row(vec![
            "decrypt_failures".to_string(),
            self.counters.decrypt_failures.to_string(),
        ]);

        table
    }
}
