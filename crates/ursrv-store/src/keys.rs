//! Blob key layout shared with the aggregation job.
//!
//! `UR~<YYYY-MM-DD>-<uniqueID>` holds one client's report for a day and
//! `AR~<YYYY-MM-DD>` holds that day's aggregate. Prefix iteration over `AR~`
//! yields only aggregates; over `UR~<date>-` only that day's reports.

use chrono::NaiveDate;
use ursrv_core::DATE_FORMAT;

pub const USAGE_REPORT_PREFIX: &str = "UR~";
pub const AGGREGATE_PREFIX: &str = "AR~";

pub fn usage_report_key(date: NaiveDate, unique_id: &str) -> String {
    format!("{}{}", usage_report_day_prefix(date), unique_id)
}

pub fn usage_report_day_prefix(date: NaiveDate) -> String {
    format!("{}{}-", USAGE_REPORT_PREFIX, date.format(DATE_FORMAT))
}

pub fn aggregate_key(date: NaiveDate) -> String {
    format!("{}{}", AGGREGATE_PREFIX, date.format(DATE_FORMAT))
}
