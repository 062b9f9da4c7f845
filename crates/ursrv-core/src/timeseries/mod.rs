//! Dashboard time-series tables derived from daily aggregates.
//!
//! Tables are emitted as arrays of rows with a header row first, ready for
//! direct JSON encoding by the dashboard. Output only depends on the set of
//! folded aggregates, never on hash map iteration order.

mod block_stats;
mod performance;
mod summary;

pub use block_stats::{BlockStatsTable, BLOCKS_PER_GIB};
pub use performance::PerformanceTable;
pub use summary::SummaryTable;

use serde_json::Value;

use crate::AggregatedReport;

pub type Row = Vec<Value>;

/// Header row followed by data rows.
pub type Table = Vec<Row>;

/// The three history-derived tables, folded together.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesTables {
    pub summary: SummaryTable,
    pub performance: PerformanceTable,
    pub block_stats: BlockStatsTable,
}

impl TimeSeriesTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from scratch, folding oldest day first.
    pub fn rebuild<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a AggregatedReport>,
    {
        let mut sorted: Vec<&AggregatedReport> = reports.into_iter().collect();
        sorted.sort_by_key(|r| r.date);

        let mut tables = Self::new();
        for report in sorted {
            tables.fold(report);
        }
        tables
    }

    /// Append one day. Callers must fold in chronological order.
    pub fn fold(&mut self, report: &AggregatedReport) {
        let date = report.day_label();
        self.summary.set_counts(&date, &report.version_count);
        self.performance.push(report);
        self.block_stats.push(report);
    }
}
