use crate::bind::decode_row;
use crate::connection::{ConnectionManager, Session};
use crate::error::DbError;
use crate::query::{self, AttrMap, ColumnFilter, describe};
use crate::store::{RowSet, RowStore};
use async_trait::async_trait;
use core_types::ident::ID_COLUMN;
use core_types::{TableDefinition, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;

/// The PostgreSQL-backed [`RowStore`]. It turns attribute maps into
/// parametrized statements and runs them through its connection manager.
#[derive(Clone)]
pub struct PersistenceEngine {
    connection: Arc<ConnectionManager>,
}

impl PersistenceEngine {
    /// Creates a new engine on top of an explicitly constructed connection manager.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    async fn table_exists_in(session: &mut Session<'_>, table: &str) -> Result<bool, DbError> {
        let statement = query::table_exists(table);
        let rows = session.execute(table, &statement).await?;
        Ok(!rows.is_empty())
    }
}

/// The id from the single row an `INSERT ... RETURNING id` produces.
fn returned_id(rows: &[PgRow]) -> Result<i64, DbError> {
    let Some(row) = rows.first() else {
        return Err(DbError::Decode {
            column: ID_COLUMN.to_string(),
            type_name: "(no row)".to_string(),
            reason: "INSERT ... RETURNING id returned no row".to_string(),
        });
    };
    decode_row(row)?
        .first()
        .and_then(Value::as_int)
        .ok_or_else(|| DbError::Decode {
            column: ID_COLUMN.to_string(),
            type_name: row
                .columns()
                .first()
                .map_or_else(|| "(no column)".to_string(), |c| c.type_info().name().to_string()),
            reason: "INSERT ... RETURNING id produced no integer id".to_string(),
        })
}

#[async_trait]
impl RowStore for PersistenceEngine {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut session = self.connection.session().await?;
        Self::table_exists_in(&mut session, table).await
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), DbError> {
        let statement = query::create_table(definition).inspect_err(|e| {
            tracing::error!(table = definition.name(), error = %e, "Refusing to build CREATE TABLE.");
        })?;
        let mut session = self.connection.session().await?;
        session.execute(definition.name(), &statement).await?;
        tracing::info!(table = definition.name(), "Table created.");
        Ok(())
    }

    /// Checks and creates under one lock so no other statement runs in between.
    async fn ensure_table(&self, definition: &TableDefinition) -> Result<bool, DbError> {
        let statement = query::create_table(definition).inspect_err(|e| {
            tracing::error!(table = definition.name(), error = %e, "Refusing to build CREATE TABLE.");
        })?;
        let mut session = self.connection.session().await?;
        if Self::table_exists_in(&mut session, definition.name()).await? {
            tracing::debug!(table = definition.name(), "Table already exists.");
            return Ok(false);
        }
        session.execute(definition.name(), &statement).await?;
        tracing::info!(table = definition.name(), "Table created.");
        Ok(true)
    }

    async fn insert(&self, table: &str, attrs: &AttrMap) -> Result<i64, DbError> {
        let report = |e: &DbError| {
            tracing::error!(table, values = %describe(attrs), error = %e, "Error inserting row.");
        };

        let statement = query::insert(table, attrs).inspect_err(report)?;
        let mut session = self.connection.session().await.inspect_err(report)?;
        let rows = session.execute(table, &statement).await.inspect_err(report)?;

        let id = returned_id(&rows).inspect_err(report)?;

        tracing::debug!(table, id, "Row inserted.");
        Ok(id)
    }

    async fn update(&self, table: &str, attrs: &AttrMap) -> Result<(), DbError> {
        let report = |e: &DbError| {
            tracing::error!(table, values = %describe(attrs), error = %e, "Error updating row.");
        };

        let Some(statement) = query::update(table, attrs).inspect_err(report)? else {
            tracing::debug!(table, "Nothing to update besides the id, skipping.");
            return Ok(());
        };
        let mut session = self.connection.session().await.inspect_err(report)?;
        session.execute(table, &statement).await.inspect_err(report)?;
        Ok(())
    }

    async fn get(&self, table: &str, filter: &ColumnFilter) -> Result<RowSet, DbError> {
        let report = |e: &DbError| {
            tracing::error!(table, columns = ?filter.keys().collect::<Vec<_>>(), error = %e, "Error selecting rows.");
        };

        let (statement, columns) = query::select(table, filter).inspect_err(report)?;
        let mut session = self.connection.session().await.inspect_err(report)?;
        let rows = session.execute(table, &statement).await.inspect_err(report)?;

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(report)?;
        Ok(RowSet { columns, rows })
    }
}
