use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, PaginatorTrait, QueryTrait,
};
use serde_json::Value;

use super::executor::{Execution, QueryExecutor};
use crate::errors::ExecutionError;
use crate::query::GridQuery;

/// Executes grid queries for entity `E`, returning rows as JSON objects.
///
/// The grid resource name must be the entity's table name, since every
/// column reference is qualified with it.
pub struct SeaOrmExecutor<E> {
    db: DatabaseConnection,
    entity: PhantomData<fn() -> E>,
}

impl<E> SeaOrmExecutor<E>
where
    E: EntityTrait,
{
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            entity: PhantomData,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl<E> Clone for SeaOrmExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E> QueryExecutor for SeaOrmExecutor<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    type Row = Value;

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    async fn execute(&self, query: &GridQuery) -> Result<Execution<Value>, ExecutionError> {
        let mut select = E::find();
        query.apply_conditions(QueryTrait::query(&mut select));

        let total_count = if query.count_total() {
            Some(PaginatorTrait::count(select.clone(), &self.db).await?)
        } else {
            None
        };

        query.apply_ordering(QueryTrait::query(&mut select));
        let rows = select.into_json().all(&self.db).await?;
        tracing::debug!(
            resource = query.resource(),
            rows = rows.len(),
            total_count,
            "Executed grid query"
        );
        Ok(Execution::new(rows, total_count))
    }
}
