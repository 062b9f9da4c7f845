//! Version adoption over time.
//!
//! Each folded day contributes one sparse row of per-version counts. Versions
//! get a column slot the first time they are seen; slots are never reused or
//! renumbered. Rows only grow as far as the highest slot the day touched, so
//! a missing or zero cell means "no data" and serializes as `null`.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::{Row, Table};
use crate::version::compare_versions;

#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    /// Version label to column slot, in first-seen order.
    columns: HashMap<String, usize>,
    /// Version label to the highest single-day count observed.
    max: HashMap<String, i64>,
    /// Day label to counts indexed by column slot.
    rows: HashMap<String, Vec<i64>>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one day's per-version counts.
    pub fn set_counts(&mut self, date: &str, counts: &BTreeMap<String, i64>) {
        for (version, &count) in counts {
            let next = self.columns.len();
            let idx = *self.columns.entry(version.clone()).or_insert(next);

            let max = self.max.entry(version.clone()).or_insert(count);
            if *max < count {
                *max = count;
            }

            let row = self.rows.entry(date.to_string()).or_default();
            if row.len() <= idx {
                row.resize(idx + 1, 0);
            }
            row[idx] = count;
        }
    }

    pub fn day_count(&self) -> usize {
        self.rows.len()
    }

    /// Highest single-day count seen for `version`.
    pub fn max_count(&self, version: &str) -> Option<i64> {
        self.max.get(version).copied()
    }

    /// Versions whose peak exceeds `min_adoption`, in release order.
    fn active_versions(&self, min_adoption: i64) -> Vec<&str> {
        let mut versions: Vec<&str> = self
            .max
            .iter()
            .filter(|(_, max)| **max > min_adoption)
            .map(|(version, _)| version.as_str())
            .collect();
        // Ties (e.g. `1.0` vs `v1.0`) fall back to the raw label so the order is total.
        versions.sort_by(|a, b| compare_versions(a, b).then_with(|| a.cmp(b)));
        versions
    }

    /// Build the `[["Day", v...], [date, count|null...], ...]` table.
    ///
    /// Filtering only narrows the emitted columns; stored counts are untouched.
    pub fn to_table(&self, min_adoption: i64) -> Table {
        let versions = self.active_versions(min_adoption);

        let mut header: Row = Vec::with_capacity(versions.len() + 1);
        header.push(Value::from("Day"));
        header.extend(versions.iter().map(|v| Value::from(*v)));

        let mut dates: Vec<&String> = self.rows.keys().collect();
        dates.sort();

        let mut table: Table = Vec::with_capacity(dates.len() + 1);
        table.push(header);

        for date in dates {
            let counts = &self.rows[date];
            let mut row: Row = Vec::with_capacity(versions.len() + 1);
            row.push(Value::from(date.as_str()));
            for version in &versions {
                let idx = self.columns[*version];
                match counts.get(idx) {
                    Some(&count) if count > 0 => row.push(Value::from(count)),
                    _ => row.push(Value::Null),
                }
            }
            table.push(row);
        }

        table
    }
}
