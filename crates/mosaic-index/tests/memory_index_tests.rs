//! Behaviour of the in-memory index through the `GranuleIndex` trait.

use chrono::{TimeZone, Utc};
use mosaic_common::BoundingBox;
use mosaic_index::{
    AttributeValue, Filter, GranuleIndex, IndexError, IndexQuery, IndexRecord, MemoryIndex,
    RecordId, SortBy,
};

fn hour(h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
}

fn sample_index() -> MemoryIndex {
    MemoryIndex::from_records(vec![
        IndexRecord::new("west-00", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .with_attribute("time", hour(0))
            .with_attribute("elevation", 500.0),
        IndexRecord::new("west-06", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .with_attribute("time", hour(6))
            .with_attribute("elevation", 500.0),
        IndexRecord::new("east-06", BoundingBox::new(10.0, 0.0, 20.0, 10.0))
            .with_attribute("time", hour(6))
            .with_attribute("elevation", 850.0),
        IndexRecord::new("east-12", BoundingBox::new(10.0, 0.0, 20.0, 10.0))
            .with_attribute("time", hour(12))
            .with_attribute("elevation", 500.0),
    ])
}

fn ids(records: &[IndexRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.0.as_str()).collect()
}

#[tokio::test]
async fn test_bbox_and_attribute_filter() {
    let index = sample_index();
    let query = IndexQuery::new(
        Filter::intersects(BoundingBox::new(12.0, 2.0, 15.0, 5.0))
            .and(Filter::equals("elevation", 500.0)),
    );
    let result = index.query(&query).await.unwrap();
    assert_eq!(ids(&result), vec!["east-12"]);
}

#[tokio::test]
async fn test_sorted_descending_with_limit() {
    let index = sample_index();
    let query = IndexQuery::new(Filter::Include)
        .sorted_by(SortBy::descending("time"))
        .with_limit(2);
    let result = index.query(&query).await.unwrap();
    assert_eq!(ids(&result), vec!["east-12", "west-06"]);
}

#[tokio::test]
async fn test_sort_rejected_without_capability() {
    let index = sample_index().without_sorting();
    assert!(!index.supports_sorting());

    let query = IndexQuery::new(Filter::Include).sorted_by(SortBy::descending("time"));
    let err = index.query(&query).await.unwrap_err();
    assert!(matches!(err, IndexError::SortingNotSupported(ref a) if a == "time"));
}

#[tokio::test]
async fn test_aggregate_max_reports_owner() {
    let index = sample_index().without_sorting();

    let west = Filter::intersects(BoundingBox::new(1.0, 1.0, 2.0, 2.0));
    let (value, owner) = index.aggregate_max("time", &west).await.unwrap().unwrap();
    assert_eq!(value, AttributeValue::Time(hour(6)));
    assert_eq!(owner, RecordId::from("west-06"));

    let nothing = Filter::intersects(BoundingBox::new(100.0, 100.0, 101.0, 101.0));
    assert!(index.aggregate_max("time", &nothing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_requery_by_identity() {
    let index = sample_index();
    let result = index
        .query(&IndexQuery::new(Filter::Id(RecordId::from("east-06"))))
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(
        result[0].attribute("elevation"),
        Some(&AttributeValue::Number(850.0))
    );
}

#[tokio::test]
async fn test_bounds_and_distinct_values() {
    let index = sample_index();
    assert_eq!(
        index.bounds().await.unwrap(),
        Some(BoundingBox::new(0.0, 0.0, 20.0, 10.0))
    );

    let times = index.distinct_values("time").await.unwrap();
    assert_eq!(
        times,
        vec![
            AttributeValue::Time(hour(0)),
            AttributeValue::Time(hour(6)),
            AttributeValue::Time(hour(12)),
        ]
    );

    let elevations = index.distinct_values("elevation").await.unwrap();
    assert_eq!(elevations.len(), 2);
}
