use serde_json::Value;

use super::{Row, Table};
use crate::AggregatedReport;

const HEADER: [&str; 6] = [
    "Day",
    "TotFiles",
    "TotMiB",
    "SHA256Perf",
    "MemorySize",
    "MemoryUsageMiB",
];

/// Append-only performance series, one row per folded day.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTable {
    rows: Vec<Row>,
}

impl PerformanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: &AggregatedReport) {
        let perf = &report.performance;
        self.rows.push(vec![
            Value::from(report.day_label()),
            Value::from(perf.tot_files),
            Value::from(perf.tot_mib),
            Value::from(truncate_one_decimal(perf.sha256_perf)),
            Value::from(perf.memory_size),
            Value::from(perf.memory_usage_mib),
        ]);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Vec::with_capacity(self.rows.len() + 1);
        table.push(HEADER.iter().map(|h| Value::from(*h)).collect());
        table.extend(self.rows.iter().cloned());
        table
    }
}

fn truncate_one_decimal(value: f64) -> f64 {
    (value * 10.0).trunc() / 10.0
}
