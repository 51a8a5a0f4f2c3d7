use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to the database ({target}): {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("The database connection was lost before the statement could run")]
    Disconnected,

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Query on table '{table}' failed: {source}. Attempted query: {sql}")]
    QueryExecution {
        table: String,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cannot update a row of table '{table}' without an id (values: {values})")]
    MissingIdentifier { table: String, values: String },

    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),

    #[error("No columns were requested from table '{0}'")]
    EmptySelection(String),

    #[error("Statement references parameter ':{0}' but no value was supplied for it")]
    UnboundParameter(String),

    #[error("Value for column '{column}' cannot be bound: {reason}")]
    UnsupportedBind { column: String, reason: String },

    #[error("Column '{column}' of type {type_name} cannot be decoded: {reason}")]
    Decode {
        column: String,
        type_name: String,
        reason: String,
    },
}
