//! # Core schema types
//!
//! The leaf layer of the workspace: everything needed to *describe* a record
//! shape and check that description, with no database access.
//!
//! - [`Value`] / [`ValueType`]: tagged attribute values and their type tags.
//! - [`TypeCatalog`]: which SQL column types each value type may be stored as.
//! - [`AttributeSpec`] / [`ModelKind`]: declarative record shapes.
//! - [`SchemaValidator`]: checks a kind against the catalog and memoizes the verdict.
//! - [`TableDefinition`]: `CREATE TABLE` generation for a kind.
pub mod catalog;
pub mod error;
pub mod ident;
pub mod schema;
pub mod table;
pub mod validate;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use catalog::TypeCatalog;
pub use error::{CoercionError, SchemaError};
pub use schema::{AttributeDecl, AttributeSpec, ModelKind, ModelKindBuilder, Validator};
pub use table::{ColumnDef, TableDefinition};
pub use validate::SchemaValidator;
pub use value::{Value, ValueType};
