//! Warehouse connector contract.
//!
//! A [`Warehouse`] is an explicitly constructed handle over a bounded pool
//! of connections. [`Warehouse::acquire`] lends out one connection as a
//! [`WarehouseSession`]; dropping the session returns it to the pool on
//! every exit path.

use async_trait::async_trait;
use serde::Serialize;
use tidemark_types::errors::DestinationError;
use tidemark_types::row::{SqlValue, TableSpec};

use crate::validation::ValidationResult;

/// Equality filter on a text column, e.g. `pool = '0x…'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub value: String,
}

impl ColumnFilter {
    pub fn new(column: &'static str, value: impl Into<String>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Aggregate over one numeric column inside a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowStats {
    pub count: i64,
    pub sum: Option<f64>,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
}

/// One borrowed warehouse connection.
#[async_trait]
pub trait WarehouseSession: Send {
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the transaction cannot be opened.
    async fn begin(&mut self) -> Result<(), DestinationError>;

    /// # Errors
    ///
    /// Returns [`DestinationError`] if the commit fails; the transaction is
    /// then rolled back by the warehouse.
    async fn commit(&mut self) -> Result<(), DestinationError>;

    /// # Errors
    ///
    /// Returns [`DestinationError`] if the rollback statement fails.
    async fn rollback(&mut self) -> Result<(), DestinationError>;

    /// Return which of `keys` already exist in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    async fn existing_keys(
        &mut self,
        table: &TableSpec,
        keys: &[&str],
    ) -> Result<Vec<String>, DestinationError>;

    /// Insert `rows` (values in table column order) with one multi-row
    /// statement. Returns the number of rows the warehouse reports inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on statement failure.
    async fn insert_rows(
        &mut self,
        table: &TableSpec,
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, DestinationError>;
}

/// SQL warehouse the pipeline writes canonical rows to.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn Warehouse>`.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Short connector name for logs, e.g. `"dest-postgres"`.
    fn name(&self) -> &str;

    /// Borrow one connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if no connection can be obtained.
    async fn acquire(&self) -> Result<Box<dyn WarehouseSession>, DestinationError>;

    /// Create `table` with its primary key if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on DDL failure.
    async fn ensure_table(&self, table: &TableSpec) -> Result<(), DestinationError>;

    /// Values of `columns` from the most recent row of `table` (by timestamp,
    /// then key), optionally restricted by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    async fn latest_values(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Option<Vec<SqlValue>>, DestinationError>;

    /// Sums of the numeric `columns` over every row matching `filter`
    /// (0 for an empty table).
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    async fn column_sums(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Vec<f64>, DestinationError>;

    /// Aggregate `value_column` over rows with `start_ms <= timestamp < end_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    async fn window_stats(
        &self,
        table: &TableSpec,
        value_column: &'static str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<WindowStats, DestinationError>;

    /// Probe connectivity.
    async fn validate(&self) -> ValidationResult {
        ValidationResult::not_implemented()
    }
}
