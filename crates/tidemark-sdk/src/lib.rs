//! Connector contracts for tidemark.
//!
//! Sources implement [`source::Source`], warehouses implement
//! [`warehouse::Warehouse`]. Both are object safe so the engine can hold
//! them as `Arc<dyn ...>` and tests can substitute in-memory doubles.

pub mod prelude;
pub mod source;
pub mod sql;
pub mod validation;
pub mod warehouse;

pub use tidemark_types as types;
