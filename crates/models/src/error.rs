use core_types::{SchemaError, ValueType};
use database::DbError;
use thiserror::Error;

/// A write to a single attribute was rejected. The instance is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("'{name}' is not an attribute of kind '{kind}'")]
    UnknownAttribute { kind: String, name: String },

    #[error("kind '{kind}': '{value}' is not a valid {expected} for attribute '{attribute}': {reason}")]
    InvalidValue {
        kind: String,
        attribute: String,
        value: String,
        expected: ValueType,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A stored row did not satisfy the kind's current specification.
    #[error("Stored row rejected: {0}")]
    Attribute(#[from] AttributeError),
}
