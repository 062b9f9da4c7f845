use super::*;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone};
use opendal::{services, Operator};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use ursrv_core::{BlockStats, ManualClock, Performance};
use ursrv_store::{BlobStore, BlobVisitor, OpendalBlobStore};

const TTL: std::time::Duration = std::time::Duration::from_secs(120);

/// Memory-backed blob store that can be switched into failing.
struct FlakyStore {
    inner: OpendalBlobStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        let operator = Operator::new(services::Memory::default())
            .unwrap()
            .finish();
        Self {
            inner: OpendalBlobStore::new(operator),
            failing: AtomicBool::new(false),
        }
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::StoreUnavailable {
                operation: "read",
                key: key.to_string(),
                source: opendal::Error::new(opendal::ErrorKind::Unexpected, "injected failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn iterate(&self, prefix: &str, visit: &mut BlobVisitor<'_>) -> Result<(), StoreError> {
        self.check(prefix)?;
        self.inner.iterate(prefix, visit).await
    }
}

struct Fixture {
    blobs: Arc<FlakyStore>,
    store: ReportStore,
    clock: ManualClock,
    cache: TableCache,
}

/// A cache whose clock sits at noon on `today`.
fn fixture(today: NaiveDate) -> Fixture {
    let blobs = Arc::new(FlakyStore::new());
    let clock = ManualClock::new(Utc.from_utc_datetime(&today.and_hms_opt(12, 0, 0).unwrap()));
    let store = ReportStore::with_clock(blobs.clone(), Arc::new(clock.clone()));
    let cache = TableCache::new(store.clone(), Arc::new(clock.clone()), TTL);
    Fixture {
        blobs,
        store,
        clock,
        cache,
    }
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

/// Aggregate for 2024-01-`n` with a version mix that changes over time.
fn aggregate(n: u32) -> AggregatedReport {
    let n64 = i64::from(n);
    let mut version_count = BTreeMap::from([("v1.0.0".to_string(), 100 - n64 * 10)]);
    if n >= 3 {
        version_count.insert("v1.1.0-rc.1".to_string(), n64 * 5);
    }
    if n >= 4 {
        version_count.insert("v1.10.0".to_string(), n64 * 20);
    }

    AggregatedReport {
        date: Utc.from_utc_datetime(&day(n).and_hms_opt(0, 0, 0).unwrap()),
        nodes: 100 + n64,
        version_count,
        performance: Performance {
            tot_files: 1000 * n64,
            tot_mib: 50 * n64,
            sha256_perf: 123.456 + f64::from(n),
            memory_size: 8192,
            memory_usage_mib: 64,
        },
        block_stats: BlockStats {
            total: 8192.0 * f64::from(n),
            pulled: 8192.0,
            renamed: 4096.0,
            ..Default::default()
        },
        locations: vec![Location {
            latitude: 59.3,
            longitude: 18.0,
            count: n64,
        }],
        ..Default::default()
    }
}

fn serialized(table: &Table) -> Vec<u8> {
    serde_json::to_vec(table).unwrap()
}

fn day_column(table: &Table) -> Vec<Value> {
    table.iter().skip(1).map(|row| row[0].clone()).collect()
}

#[tokio::test]
async fn test_cold_refresh_rebuilds_full_history() {
    let fx = fixture(day(6));
    for n in [3, 1, 5, 2, 4] {
        fx.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }

    fx.cache.refresh().await.unwrap();

    let expected_days = json!(["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"]);
    for table in [
        fx.cache.summary_table(0).await,
        fx.cache.performance_table().await,
        fx.cache.block_stats_table().await,
    ] {
        assert_eq!(table.len(), 6);
        assert_eq!(Value::from(day_column(&table)), expected_days);
    }

    let latest = fx.cache.latest_aggregate().await.unwrap();
    assert_eq!(latest.day(), day(5));
}

#[tokio::test]
async fn test_incremental_folds_match_full_rebuild() {
    // Daily arrival: each morning yesterday's aggregate lands and the cache refreshes.
    let daily = fixture(day(2));
    for n in 1..=5 {
        daily.store.put_aggregated_report(&aggregate(n)).await.unwrap();
        daily.cache.refresh().await.unwrap();
        daily.clock.advance(Duration::days(1));
    }
    daily.clock.set(Utc.from_utc_datetime(&day(6).and_hms_opt(12, 0, 0).unwrap()));

    let rebuilt = fixture(day(6));
    for n in 1..=5 {
        rebuilt.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }
    rebuilt.cache.refresh().await.unwrap();

    for min in [0, 50] {
        assert_eq!(
            serialized(&daily.cache.summary_table(min).await),
            serialized(&rebuilt.cache.summary_table(min).await)
        );
    }
    assert_eq!(
        serialized(&daily.cache.performance_table().await),
        serialized(&rebuilt.cache.performance_table().await)
    );
    assert_eq!(
        serialized(&daily.cache.block_stats_table().await),
        serialized(&rebuilt.cache.block_stats_table().await)
    );

    assert_eq!(
        daily.cache.summary_table(0).await[0],
        vec![
            Value::from("Day"),
            Value::from("v1.0.0"),
            Value::from("v1.1.0-rc.1"),
            Value::from("v1.10.0"),
        ]
    );
}

#[tokio::test]
async fn test_missing_aggregate_still_stamps_refresh_time() {
    let fx = fixture(day(6));

    fx.cache.refresh().await.unwrap();
    assert!(fx.cache.latest_aggregate().await.is_none());

    // Lands after the refresh; within the TTL nobody looks again.
    fx.store.put_aggregated_report(&aggregate(5)).await.unwrap();
    assert_eq!(fx.cache.summary_table(0).await.len(), 1);

    fx.clock.advance(Duration::seconds(121));
    assert_eq!(fx.cache.summary_table(0).await.len(), 2);
}

#[tokio::test]
async fn test_reads_refresh_lazily_when_stale() {
    let fx = fixture(day(5));
    fx.store.put_aggregated_report(&aggregate(4)).await.unwrap();

    // Never refreshed: the first read loads everything.
    assert_eq!(fx.cache.performance_table().await.len(), 2);

    fx.store.put_aggregated_report(&aggregate(5)).await.unwrap();
    fx.clock.advance(Duration::days(1));

    let table = fx.cache.performance_table().await;
    assert_eq!(Value::from(day_column(&table)), json!(["2024-01-04", "2024-01-05"]));
}

#[tokio::test]
async fn test_failed_refresh_serves_previous_snapshot() {
    let fx = fixture(day(6));
    for n in 1..=5 {
        fx.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }
    fx.cache.refresh().await.unwrap();
    let before = serialized(&fx.cache.summary_table(0).await);

    fx.blobs.failing.store(true, Ordering::SeqCst);
    fx.clock.advance(Duration::days(1));

    assert!(matches!(
        fx.cache.refresh().await,
        Err(StoreError::StoreUnavailable { .. })
    ));
    assert_eq!(serialized(&fx.cache.summary_table(0).await), before);
    assert_eq!(fx.cache.latest_aggregate().await.unwrap().day(), day(5));

    // Recovery picks up where it left off.
    fx.blobs.failing.store(false, Ordering::SeqCst);
    fx.store.put_aggregated_report(&aggregate(6)).await.unwrap();
    assert_eq!(fx.cache.summary_table(0).await.len(), 7);
}

#[tokio::test]
async fn test_stale_or_repeated_aggregate_is_not_folded_twice() {
    let fx = fixture(day(6));
    fx.store.put_aggregated_report(&aggregate(5)).await.unwrap();

    fx.cache.refresh().await.unwrap();
    fx.cache.refresh().await.unwrap();
    fx.clock.advance(Duration::seconds(500));
    fx.cache.refresh().await.unwrap();

    assert_eq!(fx.cache.performance_table().await.len(), 2);
    assert_eq!(fx.cache.block_stats_table().await.len(), 2);
}

#[tokio::test]
async fn test_rebuild_ignores_days_after_yesterday() {
    let fx = fixture(day(5));
    for n in 3..=5 {
        fx.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }

    fx.cache.refresh().await.unwrap();
    assert_eq!(
        Value::from(day_column(&fx.cache.performance_table().await)),
        json!(["2024-01-03", "2024-01-04"])
    );

    // Today's aggregate joins exactly once, when it becomes yesterday.
    fx.clock.advance(Duration::days(1));
    fx.cache.refresh().await.unwrap();
    assert_eq!(
        Value::from(day_column(&fx.cache.performance_table().await)),
        json!(["2024-01-03", "2024-01-04", "2024-01-05"])
    );
}

#[tokio::test]
async fn test_reset_picks_up_backfilled_history() {
    let fx = fixture(day(6));
    fx.store.put_aggregated_report(&aggregate(5)).await.unwrap();
    fx.cache.refresh().await.unwrap();

    fx.store.put_aggregated_report(&aggregate(2)).await.unwrap();
    fx.cache.refresh().await.unwrap();
    assert_eq!(fx.cache.performance_table().await.len(), 2);

    fx.cache.reset().await;
    fx.cache.refresh().await.unwrap();
    assert_eq!(
        Value::from(day_column(&fx.cache.performance_table().await)),
        json!(["2024-01-02", "2024-01-05"])
    );
}

#[tokio::test]
async fn test_summary_filter_is_non_destructive() {
    let fx = fixture(day(6));
    for n in 1..=5 {
        fx.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }
    fx.cache.refresh().await.unwrap();

    // v1.1.0-rc.1 peaks at 25, v1.0.0 at 90 and v1.10.0 at 100.
    let filtered = fx.cache.summary_table(50).await;
    assert_eq!(filtered[0], vec![json!("Day"), json!("v1.0.0"), json!("v1.10.0")]);
    assert_eq!(filtered[1], vec![json!("2024-01-01"), json!(90), Value::Null]);

    let unfiltered = fx.cache.summary_table(0).await;
    assert_eq!(unfiltered[0].len(), 4);
    assert_eq!(unfiltered[5], vec![json!("2024-01-05"), json!(50), json!(25), json!(100)]);
}

#[tokio::test]
async fn test_weighted_locations_come_from_latest_only() {
    let fx = fixture(day(6));
    assert!(fx.cache.weighted_locations().await.is_empty());

    for n in 1..=5 {
        fx.store.put_aggregated_report(&aggregate(n)).await.unwrap();
    }
    fx.cache.reset().await;

    let locations = fx.cache.weighted_locations().await;
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].count, 5);
}
