//! An in-memory [`RowStore`] for exercising models without PostgreSQL.

use async_trait::async_trait;
use core_types::ident::ID_COLUMN;
use core_types::{TableDefinition, Value};
use database::{AttrMap, ColumnFilter, DbError, RowSet, RowStore};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<AttrMap>>>,
    statements: Mutex<usize>,
    failing: bool,
    yielding: bool,
}

impl MemoryStore {
    /// A store whose every statement fails as if the connection dropped.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// A store that yields to the runtime before every write, as a network
    /// round trip would.
    pub(crate) fn yielding() -> Self {
        Self {
            yielding: true,
            ..Default::default()
        }
    }

    /// Number of statements that reached the store.
    pub(crate) fn statements(&self) -> usize {
        *self.statements.lock().unwrap()
    }

    pub(crate) fn row_count(&self, table: &str) -> usize {
        self.tables.lock().unwrap().get(table).map_or(0, Vec::len)
    }

    pub(crate) fn row(&self, table: &str, id: i64) -> Option<AttrMap> {
        self.tables
            .lock()
            .unwrap()
            .get(table)?
            .iter()
            .find(|row| row.get(ID_COLUMN) == Some(&Value::Int(id)))
            .cloned()
    }

    fn begin(&self) -> Result<(), DbError> {
        if self.failing {
            return Err(DbError::Disconnected);
        }
        *self.statements.lock().unwrap() += 1;
        Ok(())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        self.begin()?;
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), DbError> {
        self.begin()?;
        self.tables
            .lock()
            .unwrap()
            .insert(definition.name().to_string(), Vec::new());
        Ok(())
    }

    async fn insert(&self, table: &str, attrs: &AttrMap) -> Result<i64, DbError> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.begin()?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let id = rows.len() as i64 + 1;
        let mut row = attrs.clone();
        row.insert(ID_COLUMN.to_string(), Value::Int(id));
        rows.push(row);
        Ok(id)
    }

    async fn update(&self, table: &str, attrs: &AttrMap) -> Result<(), DbError> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.begin()?;
        let id = attrs.get(ID_COLUMN).cloned();
        let mut tables = self.tables.lock().unwrap();
        if let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row.get(ID_COLUMN) == id.as_ref()))
        {
            row.extend(attrs.clone());
        }
        Ok(())
    }

    async fn get(&self, table: &str, filter: &ColumnFilter) -> Result<RowSet, DbError> {
        self.begin()?;
        let columns: Vec<String> = filter.keys().cloned().collect();
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| {
                filter.iter().all(|(column, wanted)| match wanted {
                    Some(v) if v.is_truthy() => row.get(column) == Some(v),
                    _ => true,
                })
            })
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(RowSet { columns, rows })
    }
}
