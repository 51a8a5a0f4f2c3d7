//! # Marquee Database Crate
//!
//! The persistence engine: turns attribute maps into parametrized SQL and runs
//! it against PostgreSQL.
//!
//! ## Architectural Principles
//!
//! - **Identifiers are checked, values are bound:** table and column names are
//!   validated before they are spliced into SQL text; every value travels as a
//!   bound parameter.
//! - **One connection, one lock:** a [`ConnectionManager`] owns a single
//!   connection + cursor pair and serializes every statement through it. Each
//!   statement runs in its own transaction.
//! - **A trait seam:** callers program against [`RowStore`]; [`PersistenceEngine`]
//!   is the PostgreSQL implementation.
//!
//! ## Public API
//!
//! - `ConnectionManager`: lazy connect, idempotent close, connection state queries.
//! - `PersistenceEngine`: `table_exists`, `create_table`, `ensure_table`, `save`,
//!   `insert`, `update` and `get` through the `RowStore` trait.
//! - `query`: the statement builders, usable without a database.
//! - `DbError`: the specific error types that can be returned from this crate.

mod bind;
pub mod connection;
pub mod error;
pub mod query;
pub mod repository;
pub mod store;

pub use connection::ConnectionManager;
pub use error::DbError;
pub use query::{AttrMap, ColumnFilter, Statement};
pub use repository::PersistenceEngine;
pub use store::{RowSet, RowStore};
