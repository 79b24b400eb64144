use super::*;
use crate::kv::DataPoint;
use tokio::sync::mpsc;

fn points(ts: &[i64]) -> Vec<DataPoint> {
    ts.iter().map(|&t| DataPoint::new("temp", t, t as f64)).collect()
}

#[test]
fn test_partition_order_follows_query_order() {
    let desc = ReadQuery::raw("temp", 0, 100, 10, Order::Desc);
    let mut cursor = QueryCursor::new(&desc, vec![0, 60, 120], CursorSink::Buffer(Vec::new()));
    let mut visited = Vec::new();
    while let Some(partition) = cursor.next_partition() {
        visited.push(partition);
    }
    assert_eq!(visited, vec![120, 60, 0]);
    assert!(!cursor.has_next_partition());

    let asc = ReadQuery::raw("temp", 0, 100, 10, Order::Asc);
    let mut cursor = QueryCursor::new(&asc, vec![0, 60, 120], CursorSink::Buffer(Vec::new()));
    assert_eq!(cursor.next_partition(), Some(0));
}

#[tokio::test]
async fn test_limit_truncates_across_partitions() {
    let query = ReadQuery::raw("temp", 0, 1000, 3, Order::Desc);
    let mut cursor = QueryCursor::new(&query, vec![0, 1], CursorSink::Buffer(Vec::new()));
    assert_eq!(cursor.current_limit(), Some(3));

    cursor.add_data(points(&[900, 800])).await.unwrap();
    assert_eq!(cursor.current_limit(), Some(1));
    assert!(!cursor.is_full());

    cursor.add_data(points(&[500, 400, 300])).await.unwrap();
    assert!(cursor.is_full());
    assert_eq!(cursor.rows(), 3);
    assert_eq!(cursor.last_entry_ts(), 900);
    let data = cursor.into_data();
    assert_eq!(data.iter().map(|p| p.ts).collect::<Vec<_>>(), vec![900, 800, 500]);
}

#[tokio::test]
async fn test_delete_cursor_is_unbounded() {
    let query = DeleteQuery::new("temp", 0, 1000);
    let mut cursor = QueryCursor::for_delete(&query, vec![0]);
    assert_eq!(cursor.current_limit(), None);
    cursor.add_deleted(5);
    cursor.add_deleted(2);
    assert_eq!(cursor.rows(), 7);
    assert!(!cursor.is_full());
    assert!(cursor.into_data().is_empty());
}

#[tokio::test]
async fn test_channel_sink_forwards_rows() {
    let (tx, mut rx) = mpsc::channel(8);
    let query = ReadQuery::raw("temp", 0, 1000, 10, Order::Asc);
    let mut cursor = QueryCursor::new(&query, vec![0], CursorSink::Channel(tx));
    cursor.add_data(points(&[1, 2])).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().ts, 1);
    assert_eq!(rx.recv().await.unwrap().ts, 2);
    assert!(cursor.into_data().is_empty());
}

#[tokio::test]
async fn test_channel_sink_reports_dropped_receiver() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let query = ReadQuery::raw("temp", 0, 1000, 10, Order::Asc);
    let mut cursor = QueryCursor::new(&query, vec![0], CursorSink::Channel(tx));
    let result = cursor.add_data(points(&[1])).await;
    assert!(matches!(result, Err(crate::storage::Error::Worker(_))));
}
