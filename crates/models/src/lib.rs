//! # Marquee Models Crate
//!
//! Record instances on top of the schema layer.
//!
//! - [`ModelRegistry`]: validates a kind, hands out [`Model`] instances of it
//!   and keeps every instance it created, per kind.
//! - [`Model`]: one record. Attribute access is explicit `get` / `set` over
//!   [`core_types::Value`]s, checked against the kind's specification on every
//!   write. `save` routes through any [`database::RowStore`].
//! - [`AttributeError`] / [`ModelError`]: rejected writes and propagated
//!   schema or database failures.

pub mod error;
pub mod model;
pub mod registry;

#[cfg(test)]
mod memory;

pub use error::{AttributeError, ModelError};
pub use model::Model;
pub use registry::ModelRegistry;
