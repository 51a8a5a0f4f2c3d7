use crate::value::ValueType;
use thiserror::Error;

/// A value could not be converted to an attribute's declared type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("value '{value}' of type {from} cannot be converted to {to}")]
pub struct CoercionError {
    pub value: String,
    pub from: ValueType,
    pub to: ValueType,
}

/// Reasons a model kind's declaration is rejected.
///
/// A kind that fails with any of these can never produce instances.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("kind name '{0}' is not a valid SQL identifier")]
    InvalidKindName(String),

    #[error("kind '{kind}': attribute name '{attribute}' is reserved or not a valid SQL identifier")]
    InvalidAttributeName { kind: String, attribute: String },

    #[error("kind '{kind}': attribute '{attribute}' is declared more than once")]
    DuplicateAttribute { kind: String, attribute: String },

    #[error("kind '{kind}': attribute '{attribute}' uses unsupported application type '{value_type}'")]
    UnsupportedApplicationType {
        kind: String,
        attribute: String,
        value_type: String,
    },

    #[error("kind '{kind}': attribute '{attribute}' uses unsupported SQL type '{sql_type}'")]
    UnsupportedSqlType {
        kind: String,
        attribute: String,
        sql_type: String,
    },

    #[error("kind '{kind}': validator '{validator}' on attribute '{attribute}' cannot be called")]
    ValidatorNotCallable {
        kind: String,
        attribute: String,
        validator: String,
    },

    #[error("kind '{kind}': default '{default}' of attribute '{attribute}' is {found}, expected {expected}")]
    DefaultTypeMismatch {
        kind: String,
        attribute: String,
        default: String,
        expected: ValueType,
        found: ValueType,
    },
}

impl SchemaError {
    /// The name of the kind the error was raised for.
    pub fn kind(&self) -> &str {
        match self {
            SchemaError::InvalidKindName(kind) => kind,
            SchemaError::InvalidAttributeName { kind, .. }
            | SchemaError::DuplicateAttribute { kind, .. }
            | SchemaError::UnsupportedApplicationType { kind, .. }
            | SchemaError::UnsupportedSqlType { kind, .. }
            | SchemaError::ValidatorNotCallable { kind, .. }
            | SchemaError::DefaultTypeMismatch { kind, .. } => kind,
        }
    }
}
