// Dashboard table cache
//
// Holds the newest aggregate plus the tables folded from aggregate history.
// One mutex guards the whole snapshot and is held across store I/O during a
// refresh, so readers always see a consistent view.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use ursrv_core::{AggregatedReport, Clock, Location, Table, TimeSeriesTables};
use ursrv_store::{ReportStore, StoreError};

#[derive(Default)]
struct Snapshot {
    /// `None` until the first aggregate has been loaded (cold).
    latest: Option<AggregatedReport>,
    tables: TimeSeriesTables,
    last_refreshed: Option<DateTime<Utc>>,
}

/// TTL-bounded cache of the dashboard views.
pub struct TableCache {
    store: ReportStore,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: Mutex<Snapshot>,
}

impl TableCache {
    pub fn new(store: ReportStore, clock: Arc<dyn Clock>, ttl: std::time::Duration) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Pull yesterday's aggregate and fold it in.
    ///
    /// A cold cache rebuilds every table from the full aggregate history; a
    /// warm one folds the new aggregate only if it is newer than the one it
    /// already holds. On failure the previous snapshot is left untouched.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.lock().await;
        self.refresh_locked(&mut snapshot).await
    }

    /// Drop back to cold so the next refresh rebuilds from full history.
    /// Needed after aggregates are backfilled out of order.
    pub async fn reset(&self) {
        let mut snapshot = self.snapshot.lock().await;
        *snapshot = Snapshot::default();
        info!("Table cache reset");
    }

    pub async fn latest_aggregate(&self) -> Option<AggregatedReport> {
        self.fresh().await.latest.clone()
    }

    /// Version adoption per day, limited to versions whose best day exceeded
    /// `min_adoption` reporting devices.
    pub async fn summary_table(&self, min_adoption: i64) -> Table {
        self.fresh().await.tables.summary.to_table(min_adoption)
    }

    pub async fn performance_table(&self) -> Table {
        self.fresh().await.tables.performance.to_table()
    }

    pub async fn block_stats_table(&self) -> Table {
        self.fresh().await.tables.block_stats.to_table()
    }

    /// Device locations from the newest aggregate only.
    pub async fn weighted_locations(&self) -> Vec<Location> {
        self.fresh()
            .await
            .latest
            .as_ref()
            .map(|latest| latest.locations.clone())
            .unwrap_or_default()
    }

    /// Lock the snapshot, refreshing first if it has gone stale.
    async fn fresh(&self) -> MutexGuard<'_, Snapshot> {
        let mut snapshot = self.snapshot.lock().await;

        let stale = match snapshot.last_refreshed {
            Some(at) => self.clock.now() - at > self.ttl,
            None => true,
        };

        if stale {
            if let Err(e) = self.refresh_locked(&mut snapshot).await {
                warn!(
                    error = %e,
                    code = e.code().as_str(),
                    "Cache refresh failed, serving previous snapshot"
                );
            }
        }

        snapshot
    }

    async fn refresh_locked(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        let fetched = match self.store.last_aggregated_report().await {
            Ok(report) => report,
            Err(StoreError::NoAggregateFound { date }) => {
                debug!(date = %date, "No aggregate for yesterday yet");
                snapshot.last_refreshed = Some(self.clock.now());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match &snapshot.latest {
            None => {
                let mut history = self.store.list_aggregated_reports().await?;
                // Later days get folded incrementally once they become "yesterday".
                history.retain(|report| report.date <= fetched.date);
                if !history.iter().any(|report| report.day() == fetched.day()) {
                    history.push(fetched.clone());
                }

                snapshot.tables = TimeSeriesTables::rebuild(&history);
                info!(
                    days = history.len(),
                    latest = %fetched.day_label(),
                    "Rebuilt dashboard tables from aggregate history"
                );
            }
            Some(latest) if fetched.date > latest.date => {
                snapshot.tables.fold(&fetched);
                debug!(day = %fetched.day_label(), "Folded new aggregate");
            }
            Some(_) => {}
        }

        snapshot.latest = Some(fetched);
        snapshot.last_refreshed = Some(self.clock.now());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
