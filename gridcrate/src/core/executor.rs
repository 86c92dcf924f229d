use async_trait::async_trait;
use sea_orm::DatabaseBackend;
use serde::Serialize;

use crate::errors::ExecutionError;
use crate::query::GridQuery;

/// Rows returned by one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution<Row> {
    pub rows: Vec<Row>,
    /// Present only when the query asked for a count.
    pub total_count: Option<u64>,
}

impl<Row> Execution<Row> {
    #[must_use]
    pub fn new(rows: Vec<Row>, total_count: Option<u64>) -> Self {
        Self { rows, total_count }
    }
}

/// Runs a built [`GridQuery`] against some storage.
///
/// Implementations must honour every part of the query: joins, condition,
/// ordering, limit and offset, and the count flag.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Row: Serialize + Send + Sync;

    /// SQL dialect predicates are built for.
    fn backend(&self) -> DatabaseBackend;

    /// # Errors
    ///
    /// Returns an [`ExecutionError`] when the underlying storage fails.
    async fn execute(&self, query: &GridQuery) -> Result<Execution<Self::Row>, ExecutionError>;
}
