// Report store behaviour against an in-memory OpenDAL backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use opendal::{services, Operator};
use serde_json::json;
use ursrv_core::{AggregatedReport, ManualClock, UsageReport};
use ursrv_store::{BlobStore, IngestOutcome, OpendalBlobStore, ReportStore, StoreError};

fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

fn setup(now: DateTime<Utc>) -> (ReportStore, Arc<dyn BlobStore>, ManualClock) {
    let operator = Operator::new(services::Memory::default())
        .expect("memory operator")
        .finish();
    let blobs: Arc<dyn BlobStore> = Arc::new(OpendalBlobStore::new(operator));
    let clock = ManualClock::new(now);
    let store = ReportStore::with_clock(blobs.clone(), Arc::new(clock.clone()));
    (store, blobs, clock)
}

fn report(unique_id: &str) -> UsageReport {
    serde_json::from_value(json!({
        "uniqueID": unique_id,
        "urVersion": 3,
        "version": "v1.27.0",
        "platform": "linux-amd64",
        "numFolders": 4,
        "date": "1999-12-31",
        "address": "198.51.100.1"
    }))
    .unwrap()
}

fn aggregate(date: NaiveDate, nodes: i64) -> AggregatedReport {
    AggregatedReport {
        date: Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()),
        nodes,
        version_count: BTreeMap::from([("v1.27.0".to_string(), nodes)]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_second_submission_same_day_is_duplicate() {
    let (store, blobs, _) = setup(noon(2024, 3, 1));
    let received_at = noon(2024, 3, 1);

    let mut first = report("abc123");
    store.put_usage_report(&mut first, received_at).await.unwrap();
    assert_eq!(first.date, "2024-03-01");

    let mut second = report("abc123");
    let err = store
        .put_usage_report(&mut second, received_at + Duration::hours(3))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateReport { ref key } if key == "UR~2024-03-01-abc123"));

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(store.list_usage_reports_for_date(day).await.unwrap().len(), 1);

    // The next day is a fresh slot.
    let mut next_day = report("abc123");
    store
        .put_usage_report(&mut next_day, received_at + Duration::days(1))
        .await
        .unwrap();
    assert!(blobs.get("UR~2024-03-02-abc123").await.is_ok());
}

#[tokio::test]
async fn test_empty_blob_does_not_count_as_duplicate() {
    let (store, blobs, _) = setup(noon(2024, 3, 1));
    blobs.put("UR~2024-03-01-abc123", Vec::new()).await.unwrap();

    let mut fresh = report("abc123");
    store
        .put_usage_report(&mut fresh, noon(2024, 3, 1))
        .await
        .unwrap();
    assert!(!blobs.get("UR~2024-03-01-abc123").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_stamps_date_and_address() {
    let (store, _, _) = setup(noon(2024, 3, 1));

    let outcome = store
        .ingest(report("abc123"), "203.0.113.5", noon(2024, 3, 1))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Accepted { ur_version: 3 });

    let outcome = store
        .ingest(report("abc123"), "203.0.113.5", noon(2024, 3, 1))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Duplicate);

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let stored = store.list_usage_reports_for_date(day).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].date, "2024-03-01");
    assert_eq!(stored[0].address, "203.0.113.5");
    assert_eq!(stored[0].fields.get("numFolders"), Some(&json!(4)));
}

#[tokio::test]
async fn test_ingest_rejects_invalid_report() {
    let (store, _, _) = setup(noon(2024, 3, 1));
    let mut invalid = report("abc123");
    invalid.platform.clear();

    let err = store
        .ingest(invalid, "203.0.113.5", noon(2024, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidReport(_)));
}

#[tokio::test]
async fn test_reports_listed_per_day() {
    let (store, _, _) = setup(noon(2024, 3, 1));
    let ids = ["alpha", "bravo", "charlie"];
    for id in ids {
        let mut r = report(id);
        store.put_usage_report(&mut r, noon(2024, 3, 1)).await.unwrap();
    }
    let mut other_day = report("delta");
    store
        .put_usage_report(&mut other_day, noon(2024, 3, 2))
        .await
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut listed = store.list_usage_reports_for_date(day).await.unwrap();
    listed.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));

    assert_eq!(listed.len(), 3);
    for (stored, id) in listed.iter().zip(ids) {
        let mut expected = report(id);
        expected.date = "2024-03-01".to_string();
        assert_eq!(stored, &expected);
    }
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let (store, blobs, _) = setup(noon(2024, 3, 10));
    let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    store.put_aggregated_report(&aggregate(first, 10)).await.unwrap();
    blobs
        .put("AR~2024-03-02", b"{not json".to_vec())
        .await
        .unwrap();
    store
        .put_aggregated_report(&aggregate(first + Duration::days(2), 30))
        .await
        .unwrap();

    let mut aggregates = store.list_aggregated_reports().await.unwrap();
    aggregates.sort_by_key(|a| a.date);
    let nodes: Vec<i64> = aggregates.iter().map(|a| a.nodes).collect();
    assert_eq!(nodes, vec![10, 30]);
}

#[tokio::test]
async fn test_aggregate_overwrite_is_idempotent() {
    let (store, _, _) = setup(noon(2024, 3, 2));
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    store.put_aggregated_report(&aggregate(day, 10)).await.unwrap();
    store.put_aggregated_report(&aggregate(day, 11)).await.unwrap();

    let aggregates = store.list_aggregated_reports().await.unwrap();
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].nodes, 11);
}

#[tokio::test]
async fn test_last_aggregate_is_exactly_yesterday() {
    let (store, _, clock) = setup(noon(2024, 3, 10));
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    // Two days ago and today exist, yesterday does not.
    store
        .put_aggregated_report(&aggregate(today - Duration::days(2), 8))
        .await
        .unwrap();
    store.put_aggregated_report(&aggregate(today, 12)).await.unwrap();

    let err = store.last_aggregated_report().await.unwrap_err();
    assert!(matches!(err, StoreError::NoAggregateFound { ref date } if date == "2024-03-09"));

    store
        .put_aggregated_report(&aggregate(today - Duration::days(1), 10))
        .await
        .unwrap();
    assert_eq!(store.last_aggregated_report().await.unwrap().nodes, 10);

    // A day later, "yesterday" is the 10th.
    clock.advance(Duration::days(1));
    assert_eq!(store.last_aggregated_report().await.unwrap().nodes, 12);
}

#[tokio::test]
async fn test_probe_succeeds_on_empty_store() {
    let (store, _, _) = setup(noon(2024, 3, 1));
    store.probe().await.unwrap();
}
