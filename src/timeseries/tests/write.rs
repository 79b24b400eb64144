use super::*;

use crate::query::{DeleteQuery, Order, ReadQuery};
use crate::storage::{Error, Operation};

#[tokio::test]
async fn test_save_reports_data_point_days() {
    let f = fixture(StorageConfig::default());
    let point = DataPoint::new("temp", 100, 1.0);
    assert_eq!(f.dao.save(&f.entity, &point, 0).await.unwrap(), 1);
    assert_eq!(f.dao.save(&f.entity, &point, 3 * 86_400).await.unwrap(), 3);

    let long_text = DataPoint::new("log", 100, "x".repeat(1100));
    assert_eq!(f.dao.save(&f.entity, &long_text, 2 * 86_400).await.unwrap(), 6);
}

#[tokio::test]
async fn test_system_ttl_caps_requested_ttl() {
    let f = fixture(StorageConfig {
        system_ttl_secs: 2 * 86_400,
        ..Default::default()
    });
    let point = DataPoint::new("temp", 100, 1.0);
    assert_eq!(f.dao.save(&f.entity, &point, 0).await.unwrap(), 2);
    assert_eq!(f.dao.save(&f.entity, &point, 30 * 86_400).await.unwrap(), 2);
    assert_eq!(f.driver.executions(Operation::InsertTsTtl), 2);
    assert_eq!(f.driver.executions(Operation::InsertTs), 0);
}

#[tokio::test]
async fn test_partition_marker_written_once() {
    let f = fixture(granular(PartitionGranularity::Minute));
    for point in temp_points() {
        f.save(&[point]).await;
    }
    assert_eq!(f.driver.executions(Operation::InsertPartition), 1);
    assert_eq!(f.driver.partition_markers(&f.entity, "temp"), vec![0]);

    f.save(&[DataPoint::new("temp", MINUTE + 1, 5.0)]).await;
    assert_eq!(f.driver.partition_markers(&f.entity, "temp"), vec![0, MINUTE]);
    assert_eq!(f.driver.executions(Operation::InsertPartition), 2);
}

#[tokio::test]
async fn test_failed_marker_is_not_remembered() {
    let f = fixture(granular(PartitionGranularity::Minute));
    f.driver.fail_next(Operation::InsertPartition);
    let points = [DataPoint::new("temp", 100, 1.0)];
    let result = f.dao.save_all(f.tenant, &f.entity, &points, 0).await;
    assert!(matches!(result, Err(Error::Backend { .. })));
    assert!(f.driver.partition_markers(&f.entity, "temp").is_empty());

    f.save(&points).await;
    assert_eq!(f.driver.executions(Operation::InsertPartition), 2);
    assert_eq!(f.driver.partition_markers(&f.entity, "temp"), vec![0]);
}

#[tokio::test]
async fn test_indefinite_partitioning_skips_markers() {
    let f = fixture(granular(PartitionGranularity::Indefinite));
    f.save(&[DataPoint::new("temp", 1, 1.0), DataPoint::new("temp", 10 * 365 * 86_400_000, 2.0)])
        .await;
    assert_eq!(f.driver.executions(Operation::InsertPartition), 0);

    let query = ReadQuery::raw("temp", 0, i64::MAX, 10, Order::Asc);
    let result = f.dao.find_all(&f.entity, &query).await.unwrap();
    assert_eq!(result.data.len(), 2);
}

#[tokio::test]
async fn test_save_all_assigns_increasing_versions() {
    let f = fixture(StorageConfig::default());
    let first = f.save(&[DataPoint::new("temp", 100, 1.0)]).await;
    let second = f.save(&[DataPoint::new("temp", 50, 0.5), DataPoint::new("humidity", 60, 40.0)]).await;
    assert_eq!(first.versions.len(), 1);
    assert_eq!(second.versions.len(), 2);
    assert!(second.versions.iter().all(|v| *v > first.versions[0]));
    assert_eq!(second.data_point_days, 2);
}

#[tokio::test]
async fn test_write_modes() {
    let f = fixture(StorageConfig {
        save_latest: false,
        ..Default::default()
    });
    let saved = f.save(&temp_points()).await;
    assert!(saved.versions.is_empty());
    assert_eq!(saved.data_point_days, 3);
    assert_eq!(f.driver.row_count(&f.entity, "temp"), 3);
    assert!(f.dao.find_latest_opt(&f.entity, "temp").await.unwrap().is_none());

    let f = fixture(StorageConfig {
        save_ts: false,
        ..Default::default()
    });
    let saved = f.save(&temp_points()).await;
    assert_eq!(saved.versions.len(), 3);
    assert_eq!(saved.data_point_days, 0);
    assert_eq!(f.driver.row_count(&f.entity, "temp"), 0);
    assert!(f.dao.find_latest_opt(&f.entity, "temp").await.unwrap().is_some());
}

#[tokio::test]
async fn test_batch_failure_keeps_completed_writes() {
    let f = fixture(StorageConfig::default());
    f.driver.fail_next(Operation::UpsertLatest);
    let result = f.dao.save_all(f.tenant, &f.entity, &temp_points(), 0).await;
    assert!(matches!(result, Err(Error::Backend { .. })));
    assert_eq!(f.driver.row_count(&f.entity, "temp"), 3);
    assert_eq!(f.driver.executions(Operation::UpsertLatest), 3);
}

#[tokio::test]
async fn test_remove_spans_partitions() {
    let f = fixture(granular(PartitionGranularity::Minute));
    f.save(&[
        DataPoint::new("temp", 10, 1.0),
        DataPoint::new("temp", MINUTE + 10, 2.0),
        DataPoint::new("temp", 2 * MINUTE + 10, 3.0),
    ])
    .await;

    let removed = f
        .dao
        .remove(&f.entity, &DeleteQuery::new("temp", 0, 2 * MINUTE))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(f.driver.row_count(&f.entity, "temp"), 1);
}

#[tokio::test]
async fn test_remove_all_drops_latest_where_asked() {
    let f = fixture(StorageConfig::default());
    f.save(&temp_points()).await;
    f.save(&[DataPoint::new("humidity", 300, 40.0)]).await;

    let mut keep_latest = DeleteQuery::new("humidity", 0, 1000);
    keep_latest.delete_latest = false;
    let results = f
        .dao
        .remove_all(f.tenant, &f.entity, &[DeleteQuery::new("temp", 0, 1000), keep_latest])
        .await
        .unwrap();

    assert_eq!(results[0].key, "temp");
    assert_eq!(results[0].deleted_rows, 3);
    assert!(results[0].latest.as_ref().unwrap().removed);
    assert_eq!(results[1].deleted_rows, 1);
    assert!(results[1].latest.is_none());
    assert!(f.dao.find_latest_opt(&f.entity, "temp").await.unwrap().is_none());
    assert!(f.dao.find_latest_opt(&f.entity, "humidity").await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_all_validates_first() {
    let f = fixture(StorageConfig::default());
    f.save(&temp_points()).await;
    let queries = [DeleteQuery::new("temp", 0, 1000), DeleteQuery::new("temp", 10, 0)];
    assert!(f.dao.remove_all(f.tenant, &f.entity, &queries).await.is_err());
    assert_eq!(f.driver.row_count(&f.entity, "temp"), 3);
}
