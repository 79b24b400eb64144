use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use super::{BoundStatement, PreparedStatement, Result, StatementKey};

/// Asynchronous access to a keyed, range-scannable table store.
///
/// Every statement answers with a row batch laid out per [`super::schema`]:
/// writes and deletes return a mutation row, reads return their rows.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    async fn prepare(&self, key: StatementKey, text: String) -> Result<PreparedStatement>;

    async fn execute(&self, statement: BoundStatement) -> Result<RecordBatch>;

    /// Whether rows written with a ttl expire on their own
    fn supports_ttl(&self) -> bool {
        true
    }
}
