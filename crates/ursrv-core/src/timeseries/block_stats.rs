use serde_json::Value;

use super::{Row, Table};
use crate::AggregatedReport;

/// Blocks are 128 KiB, so 8 * 1024 of them make a GiB.
pub const BLOCKS_PER_GIB: f64 = 8.0 * 1024.0;

const HEADER: [&str; 8] = [
    "Day",
    "Number of Reports",
    "Transferred (GiB)",
    "Saved by renaming files (GiB)",
    "Saved by resuming transfer (GiB)",
    "Saved by reusing data from old file (GiB)",
    "Saved by reusing shifted data from old file (GiB)",
    "Saved by reusing data from other files (GiB)",
];

/// Append-only block transfer savings series.
///
/// Days with no reporting nodes or with negative block totals are dropped
/// rather than zero-filled.
#[derive(Debug, Clone, Default)]
pub struct BlockStatsTable {
    rows: Vec<Row>,
}

impl BlockStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the day produced a row.
    pub fn push(&mut self, report: &AggregatedReport) -> bool {
        let stats = &report.block_stats;
        if report.nodes <= 0 || !stats.is_valid() {
            return false;
        }

        self.rows.push(vec![
            Value::from(report.day_label()),
            Value::from(report.nodes),
            Value::from(stats.pulled / BLOCKS_PER_GIB),
            Value::from(stats.renamed / BLOCKS_PER_GIB),
            Value::from(stats.reused / BLOCKS_PER_GIB),
            Value::from(stats.copy_origin / BLOCKS_PER_GIB),
            Value::from(stats.copy_origin_shifted / BLOCKS_PER_GIB),
            Value::from(stats.copy_elsewhere / BLOCKS_PER_GIB),
        ]);
        true
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
