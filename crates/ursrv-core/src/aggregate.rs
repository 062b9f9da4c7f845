//! Daily aggregate produced by the external aggregation job.
//!
//! JSON field names are shared with the producer and must not change.
//! Every field defaults on decode so partially populated records still load.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::DATE_FORMAT;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatedReport {
    pub date: DateTime<Utc>,
    #[serde(rename = "Features")]
    pub features: BTreeMap<String, Vec<Feature>>,
    #[serde(rename = "FeatureGroups")]
    pub feature_groups: BTreeMap<String, Vec<FeatureGroup>>,
    pub nodes: i64,
    #[serde(rename = "versionNodes")]
    pub version_nodes: BTreeMap<String, i64>,
    pub categories: Vec<Category>,
    pub versions: Vec<Analytic>,
    #[serde(rename = "versionPenetrations")]
    pub version_penetrations: Vec<Analytic>,
    pub platforms: Vec<Analytic>,
    pub compilers: Vec<Analytic>,
    pub builders: Vec<Analytic>,
    pub distributions: Vec<Analytic>,
    #[serde(rename = "featureOrder")]
    pub feature_order: Vec<String>,
    pub locations: Vec<Location>,
    pub countries: Vec<Feature>,

    #[serde(rename = "versionCount")]
    pub version_count: BTreeMap<String, i64>,
    pub performance: Performance,
    #[serde(rename = "blockStats")]
    pub block_stats: BlockStats,
}

impl AggregatedReport {
    /// UTC calendar day this aggregate covers.
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// The covered day as `YYYY-MM-DD`.
    pub fn day_label(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub values: [f64; 4],
    pub key: String,
    pub descr: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub number_type: NumberType,
}

/// How a [`Category`] value is formatted on the dashboard. Encoded as an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum NumberType {
    #[default]
    Metric,
    Binary,
    Duration,
}

impl From<u8> for NumberType {
    fn from(value: u8) -> Self {
        match value {
            1 => NumberType::Binary,
            2 => NumberType::Duration,
            _ => NumberType::Metric,
        }
    }
}

impl From<NumberType> for u8 {
    fn from(value: NumberType) -> Self {
        match value {
            NumberType::Metric => 0,
            NumberType::Binary => 1,
            NumberType::Duration => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub key: String,
    pub version: String,
    pub count: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureGroup {
    pub key: String,
    pub version: String,
    pub counts: BTreeMap<String, i64>,
}

/// A geo bucket weighted by the number of reports located there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Analytic {
    pub key: String,
    pub count: i64,
    pub percentage: f64,
    pub items: Vec<Analytic>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    #[serde(rename = "totFiles")]
    pub tot_files: i64,
    #[serde(rename = "totMib")]
    pub tot_mib: i64,
    #[serde(rename = "sha256Perf")]
    pub sha256_perf: f64,
    #[serde(rename = "memorySize")]
    pub memory_size: i64,
    #[serde(rename = "memoryUsageMib")]
    pub memory_usage_mib: i64,
}

/// Block transfer totals, in blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockStats {
    pub total: f64,
    pub renamed: f64,
    pub reused: f64,
    pub pulled: f64,
    #[serde(rename = "copyOrigin")]
    pub copy_origin: f64,
    #[serde(rename = "copyOriginShifted")]
    pub copy_origin_shifted: f64,
    #[serde(rename = "copyElsewhere")]
    pub copy_elsewhere: f64,
}

impl BlockStats {
    /// Some historical days carry negative totals; those are unusable.
    /// `total` is checked along with the per-kind counters.
    pub fn is_valid(&self) -> bool {
        [
            self.total,
            self.renamed,
            self.reused,
            self.pulled,
            self.copy_origin,
            self.copy_origin_shifted,
            self.copy_elsewhere,
        ]
        .iter()
        .all(|v| *v >= 0.0)
    }
}
