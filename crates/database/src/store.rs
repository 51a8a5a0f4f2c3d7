use crate::error::DbError;
use crate::query::{AttrMap, ColumnFilter};
use async_trait::async_trait;
use core_types::ident::ID_COLUMN;
use core_types::{TableDefinition, Value};

/// Result of a SELECT: the ordered column names, then one row per match with
/// values positionally aligned to those columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Each row as column name -> value pairs.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &Value)>> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect()
        })
    }
}

/// The persistence seam between model instances and the relational store.
///
/// [`crate::PersistenceEngine`] is the PostgreSQL implementation; tests can
/// substitute an in-memory one.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), DbError>;

    /// Inserts one row and returns its generated id.
    async fn insert(&self, table: &str, attrs: &AttrMap) -> Result<i64, DbError>;

    /// Updates the row identified by the `id` entry of `attrs`.
    async fn update(&self, table: &str, attrs: &AttrMap) -> Result<(), DbError>;

    /// Selects the filter's columns, sorted, restricted by its truthy values.
    async fn get(&self, table: &str, filter: &ColumnFilter) -> Result<RowSet, DbError>;

    /// Updates when `attrs` carries a truthy id, otherwise drops any `id` entry
    /// and inserts, returning the new id.
    async fn save(&self, table: &str, mut attrs: AttrMap) -> Result<Option<i64>, DbError> {
        if attrs.get(ID_COLUMN).is_some_and(Value::is_truthy) {
            self.update(table, &attrs).await?;
            Ok(None)
        } else {
            attrs.remove(ID_COLUMN);
            self.insert(table, &attrs).await.map(Some)
        }
    }

    /// Creates the table unless it already exists; returns whether it did.
    async fn ensure_table(&self, definition: &TableDefinition) -> Result<bool, DbError> {
        if self.table_exists(definition.name()).await? {
            return Ok(false);
        }
        self.create_table(definition).await?;
        Ok(true)
    }
}
