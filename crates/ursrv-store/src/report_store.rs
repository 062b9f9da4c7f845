//! Report persistence on top of a [`BlobStore`].

use crate::blob::BlobStore;
use crate::error::{Result, StoreError};
use crate::keys;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use ursrv_core::{AggregatedReport, Clock, SystemClock, UsageReport, DATE_FORMAT};

/// Result of submitting a usage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored for the first time today.
    Accepted { ur_version: u32 },
    /// A report from this client already exists for today.
    Duplicate,
}

/// JSON encoding of usage reports and aggregates, keyed by day.
///
/// Deduplication is a check-then-write on the report key and is therefore
/// best-effort under concurrent duplicate submissions.
#[derive(Clone)]
pub struct ReportStore {
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl ReportStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_clock(blobs, Arc::new(SystemClock))
    }

    pub fn with_clock(blobs: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { blobs, clock }
    }

    /// Validate, stamp and store a freshly received report.
    ///
    /// `address` is the submitter address resolved by the caller; whatever
    /// the payload claimed is discarded.
    pub async fn ingest(
        &self,
        mut report: UsageReport,
        address: &str,
        received_at: DateTime<Utc>,
    ) -> Result<IngestOutcome> {
        report.validate()?;
        report.address = address.to_string();

        match self.put_usage_report(&mut report, received_at).await {
            Ok(()) => Ok(IngestOutcome::Accepted {
                ur_version: report.ur_version,
            }),
            Err(StoreError::DuplicateReport { key }) => {
                debug!(key = %key, "duplicate usage report");
                Ok(IngestOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Store a usage report under the UTC day of `received_at`.
    ///
    /// Fails with [`StoreError::DuplicateReport`] if a non-empty report for
    /// the same client and day is already stored.
    pub async fn put_usage_report(
        &self,
        report: &mut UsageReport,
        received_at: DateTime<Utc>,
    ) -> Result<()> {
        let day = received_at.date_naive();
        report.date = day.format(DATE_FORMAT).to_string();
        let key = keys::usage_report_key(day, &report.unique_id);

        match self.blobs.get(&key).await {
            Ok(existing) if !existing.is_empty() => {
                return Err(StoreError::DuplicateReport { key });
            }
            Ok(_) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let data = encode(&key, report)?;
        self.blobs.put(&key, data).await
    }

    /// Store or overwrite the aggregate for the report's day.
    pub async fn put_aggregated_report(&self, report: &AggregatedReport) -> Result<()> {
        let key = keys::aggregate_key(report.day());
        let data = encode(&key, report)?;
        self.blobs.put(&key, data).await
    }

    /// All decodable usage reports stored for `date`.
    pub async fn list_usage_reports_for_date(&self, date: NaiveDate) -> Result<Vec<UsageReport>> {
        self.collect(&keys::usage_report_day_prefix(date)).await
    }

    /// All decodable aggregates, in no particular order.
    pub async fn list_aggregated_reports(&self) -> Result<Vec<AggregatedReport>> {
        self.collect(keys::AGGREGATE_PREFIX).await
    }

    /// The aggregate for `date`, or [`StoreError::NoAggregateFound`].
    pub async fn aggregated_report(&self, date: NaiveDate) -> Result<AggregatedReport> {
        let key = keys::aggregate_key(date);
        let data = match self.blobs.get(&key).await {
            Ok(data) => data,
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::NoAggregateFound {
                    date: date.format(DATE_FORMAT).to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        serde_json::from_slice(&data).map_err(|source| StoreError::MalformedRecord { key, source })
    }

    /// The aggregate for exactly yesterday (UTC).
    ///
    /// An older aggregate does not count: if the aggregation job has not run
    /// for yesterday yet this fails with [`StoreError::NoAggregateFound`].
    pub async fn last_aggregated_report(&self) -> Result<AggregatedReport> {
        let yesterday = self.clock.now().date_naive() - Duration::days(1);
        self.aggregated_report(yesterday).await
    }

    /// Backend reachability probe; lists the aggregate prefix and reads at
    /// most one blob.
    pub async fn probe(&self) -> Result<()> {
        self.blobs
            .iterate(keys::AGGREGATE_PREFIX, &mut |_, _| false)
            .await
    }

    async fn collect<T>(&self, prefix: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut records = Vec::new();
        self.blobs
            .iterate(prefix, &mut |key, data| {
                match serde_json::from_slice::<T>(&data) {
                    Ok(record) => records.push(record),
                    Err(source) => {
                        let err = StoreError::MalformedRecord {
                            key: key.to_string(),
                            source,
                        };
                        warn!(code = err.code().as_str(), "{}", err);
                    }
                }
                true
            })
            .await?;
        Ok(records)
    }
}

fn encode<T: Serialize>(key: &str, record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}
