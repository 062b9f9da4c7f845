//! Core domain logic for the usage reporting server.
//!
//! Pure types and algorithms with no async runtime and no I/O:
//! - [`UsageReport`]: a single client's daily submission
//! - [`AggregatedReport`]: one day's rollup produced by the aggregation job
//! - [`timeseries`]: folding aggregates into the dashboard tables
//! - [`version`]: release-aware version ordering for table columns
//! - [`clock`]: injectable time source

pub mod aggregate;
pub mod clock;
pub mod report;
pub mod timeseries;
pub mod version;

pub use aggregate::{
    AggregatedReport, Analytic, BlockStats, Category, Feature, FeatureGroup, Location,
    NumberType, Performance,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use report::{UsageReport, ValidationError};
pub use timeseries::{Table, TimeSeriesTables};
pub use version::compare_versions;

/// Day format used for report dates, storage keys and table rows.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
