use std::collections::VecDeque;

use tokio::sync::mpsc;

use super::{DeleteQuery, Order, ReadQuery};
use crate::kv::DataPoint;
use crate::storage::{Error, Result};

/// Where rows gathered by a cursor go
#[derive(Debug)]
pub enum CursorSink {
    Buffer(Vec<DataPoint>),
    /// Hands rows to a consumer as each partition is read
    Channel(mpsc::Sender<DataPoint>),
    /// Deletes only count rows
    Discard,
}

impl CursorSink {
    async fn accept(&mut self, rows: Vec<DataPoint>) -> Result<()> {
        match self {
            CursorSink::Buffer(data) => data.extend(rows),
            CursorSink::Channel(tx) => {
                for row in rows {
                    tx.send(row)
                        .await
                        .map_err(|_| Error::Worker("read stream receiver dropped".to_string()))?;
                }
            }
            CursorSink::Discard => {}
        }
        Ok(())
    }
}

/// Walks the partitions of one key in query order, bounding each read by
/// the rows still missing from the limit.
#[derive(Debug)]
pub struct QueryCursor {
    pub key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub order: Order,
    partitions: VecDeque<i64>,
    /// `None` reads every partition to exhaustion
    remaining: Option<usize>,
    rows: usize,
    last_entry_ts: i64,
    sink: CursorSink,
}

impl QueryCursor {
    /// `partitions` must be sorted oldest first
    pub fn new(query: &ReadQuery, partitions: Vec<i64>, sink: CursorSink) -> Self {
        Self {
            key: query.key.clone(),
            start_ts: query.start_ts,
            end_ts: query.end_ts,
            order: query.order,
            partitions: partitions.into(),
            remaining: Some(query.limit),
            rows: 0,
            last_entry_ts: 0,
            sink,
        }
    }

    /// Cursor for deletes: no limit, no rows kept
    pub fn for_delete(query: &DeleteQuery, partitions: Vec<i64>) -> Self {
        Self {
            key: query.key.clone(),
            start_ts: query.start_ts,
            end_ts: query.end_ts,
            order: Order::Asc,
            partitions: partitions.into(),
            remaining: None,
            rows: 0,
            last_entry_ts: 0,
            sink: CursorSink::Discard,
        }
    }

    pub fn has_next_partition(&self) -> bool {
        !self.partitions.is_empty()
    }

    /// Newest partition first for DESC, oldest first for ASC
    pub fn next_partition(&mut self) -> Option<i64> {
        match self.order {
            Order::Desc => self.partitions.pop_back(),
            Order::Asc => self.partitions.pop_front(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Row budget for the next partition read
    pub fn current_limit(&self) -> Option<usize> {
        self.remaining
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Count rows removed by a delete step
    pub fn add_deleted(&mut self, rows: u64) {
        self.rows += rows as usize;
    }

    pub async fn add_data(&mut self, mut rows: Vec<DataPoint>) -> Result<()> {
        if let Some(remaining) = self.remaining {
            rows.truncate(remaining);
            self.remaining = Some(remaining - rows.len());
        }
        self.rows += rows.len();
        if let Some(max) = rows.iter().map(|p| p.ts).max() {
            self.last_entry_ts = self.last_entry_ts.max(max);
        }
        self.sink.accept(rows).await
    }

    pub fn last_entry_ts(&self) -> i64 {
        self.last_entry_ts
    }

    /// Buffered rows, empty for streaming and delete cursors
    pub fn into_data(self) -> Vec<DataPoint> {
        match self.sink {
            CursorSink::Buffer(data) => data,
            _ => Vec::new(),
        }
    }
}
