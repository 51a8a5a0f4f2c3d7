//! SQL text generation.
//!
//! Statements are built with `:name` placeholders and compiled to PostgreSQL's
//! positional `$n` parameters just before execution. Values are only ever
//! bound, never spliced into the text; table and column names are spliced, so
//! they are checked against the identifier rule first.

use crate::error::DbError;
use core_types::ident::{ID_COLUMN, is_valid_identifier};
use core_types::{TableDefinition, Value};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Column name -> value for a single row.
pub type AttrMap = BTreeMap<String, Value>;

/// Column name -> optional equality filter. Columns with `None` (or a falsy
/// value) are selected but do not restrict the result.
pub type ColumnFilter = BTreeMap<String, Option<Value>>;

/// A statement in its named-placeholder form together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: BTreeMap<String, Value>,
}

/// A statement ready for the driver: `$n` placeholders plus the values to bind
/// in order, each tagged with the parameter name it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub binds: Vec<(String, Value)>,
}

impl Statement {
    fn new(text: String, params: BTreeMap<String, Value>) -> Self {
        Self { text, params }
    }

    /// The statement text with `:name` placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Rewrites every `:name` placeholder to `$n`, numbering distinct names in
    /// order of first appearance. `::` casts are left alone.
    pub fn compile(&self) -> Result<CompiledStatement, DbError> {
        let text = self.text.as_str();
        let mut sql = String::with_capacity(text.len());
        let mut order: Vec<&str> = Vec::new();
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != ':' {
                sql.push(c);
                continue;
            }
            if let Some(&(_, ':')) = chars.peek() {
                chars.next();
                sql.push_str("::");
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while let Some(&(j, d)) = chars.peek() {
                if d.is_ascii_alphanumeric() || d == '_' {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            if end == start {
                sql.push(':');
                continue;
            }
            let name = &text[start..end];
            let position = match order.iter().position(|n| *n == name) {
                Some(p) => p,
                None => {
                    order.push(name);
                    order.len() - 1
                }
            };
            // Writing to a String cannot fail.
            let _ = write!(sql, "${}", position + 1);
        }

        let binds = order
            .into_iter()
            .map(|name| {
                self.params
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
                    .ok_or_else(|| DbError::UnboundParameter(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledStatement { sql, binds })
    }
}

fn check_identifier(name: &str) -> Result<(), DbError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// `SELECT 1 FROM information_schema.tables WHERE table_name = :tablename;`
pub fn table_exists(table: &str) -> Statement {
    let mut params = BTreeMap::new();
    params.insert("tablename".to_string(), Value::from(table));
    Statement::new(
        "SELECT 1 FROM information_schema.tables WHERE table_name = :tablename;".to_string(),
        params,
    )
}

/// `INSERT INTO <table> (<c1>,<c2>) VALUES (:c1,:c2) RETURNING id;`
///
/// With no columns this is `INSERT INTO <table> DEFAULT VALUES RETURNING id;`,
/// PostgreSQL's spelling of an empty column list.
pub fn insert(table: &str, attrs: &AttrMap) -> Result<Statement, DbError> {
    check_identifier(table)?;
    for column in attrs.keys() {
        check_identifier(column)?;
    }

    let text = if attrs.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES RETURNING {ID_COLUMN};")
    } else {
        let columns = attrs.keys().map(String::as_str).collect::<Vec<_>>().join(",");
        let placeholders = attrs
            .keys()
            .map(|c| format!(":{c}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("INSERT INTO {table} ({columns}) VALUES ({placeholders}) RETURNING {ID_COLUMN};")
    };
    Ok(Statement::new(text, attrs.clone()))
}

/// `UPDATE <table> SET <c1> = :c1, <c2> = :c2 WHERE id = :id;`
///
/// Returns `Ok(None)` when there is nothing besides the id to set.
pub fn update(table: &str, attrs: &AttrMap) -> Result<Option<Statement>, DbError> {
    check_identifier(table)?;
    if !attrs.get(ID_COLUMN).is_some_and(Value::is_truthy) {
        return Err(DbError::MissingIdentifier {
            table: table.to_string(),
            values: describe(attrs),
        });
    }

    let assignments = attrs
        .keys()
        .filter(|c| c.as_str() != ID_COLUMN)
        .map(|c| check_identifier(c).map(|_| format!("{c} = :{c}")))
        .collect::<Result<Vec<_>, _>>()?;
    if assignments.is_empty() {
        return Ok(None);
    }

    let text = format!(
        "UPDATE {table} SET {} WHERE {ID_COLUMN} = :{ID_COLUMN};",
        assignments.join(", ")
    );
    Ok(Some(Statement::new(text, attrs.clone())))
}

/// `SELECT <c1>,<c2> FROM <table> [WHERE <c1> = :c1 AND <c2> = :c2];`
///
/// Columns come out in lexicographic order regardless of how the caller built
/// the filter; the same order is returned alongside the statement.
pub fn select(table: &str, filter: &ColumnFilter) -> Result<(Statement, Vec<String>), DbError> {
    check_identifier(table)?;
    if filter.is_empty() {
        return Err(DbError::EmptySelection(table.to_string()));
    }
    for column in filter.keys() {
        check_identifier(column)?;
    }

    // BTreeMap iteration is already sorted.
    let columns: Vec<String> = filter.keys().cloned().collect();
    let mut text = format!("SELECT {} FROM {table}", columns.join(","));

    let params: BTreeMap<String, Value> = filter
        .iter()
        .filter_map(|(column, value)| match value {
            Some(v) if v.is_truthy() => Some((column.clone(), v.clone())),
            _ => None,
        })
        .collect();
    if !params.is_empty() {
        let conditions = params
            .keys()
            .map(|c| format!("{c} = :{c}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        text.push_str(" WHERE ");
        text.push_str(&conditions);
    }
    text.push(';');

    Ok((Statement::new(text, params), columns))
}

/// `CREATE TABLE <table> (id serial PRIMARY KEY, <c1> <type1>, ...);`
pub fn create_table(definition: &TableDefinition) -> Result<Statement, DbError> {
    check_identifier(definition.name())?;
    for column in definition.columns() {
        check_identifier(&column.name)?;
    }
    Ok(Statement::new(definition.creation_sql(), BTreeMap::new()))
}

/// Renders an attribute map for diagnostics.
pub fn describe(attrs: &AttrMap) -> String {
    let body = attrs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}
