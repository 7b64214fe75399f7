//! `SQLite` warehouse for tidemark.
//!
//! One connection behind an async mutex acts as a pool of one: a session
//! holds the lock for its lifetime and releases it on drop. Timestamps are
//! stored as `YYYY-MM-DD HH:MM:SS.mmm` text so they sort and compare
//! lexically.

pub mod config;
mod convert;
mod session;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use tidemark_sdk::prelude::*;
use tidemark_sdk::sql;
use tidemark_types::watermark::format_warehouse;

use crate::config::Config;
use crate::convert::{read_timestamp, read_value};
use crate::session::SqliteSession;

pub const CONNECTOR_NAME: &str = "dest-sqlite";

/// `SQLite`-backed [`Warehouse`].
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouse {
    /// Open or create a database file.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the file can't be opened.
    pub fn open(path: &Path) -> Result<Self, DestinationError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DestinationError::new("open", path.display().to_string(), e.to_string())
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| DestinationError::new("open", path.display().to_string(), e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (for tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if `SQLite` can't be initialized.
    pub fn in_memory() -> Result<Self, DestinationError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DestinationError::new("open", ":memory:", e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// # Errors
    ///
    /// Returns [`DestinationError`] if the configured database can't be opened.
    pub fn from_config(config: &Config) -> Result<Self, DestinationError> {
        match config.path.as_deref() {
            Some(path) if !config.is_in_memory() => Self::open(path),
            _ => Self::in_memory(),
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Count rows in `table` (test and diagnostics helper).
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    pub async fn count_rows(&self, table: &TableSpec) -> Result<i64, DestinationError> {
        let conn = self.conn.lock().await;
        let qualified = sql::qualified_table(None, table);
        conn.query_row(&format!("SELECT COUNT(*) FROM {qualified}"), [], |row| {
            row.get(0)
        })
        .map_err(|e| DestinationError::new("select", table.name, e.to_string()))
    }

    /// Every key in `table`, sorted (test and diagnostics helper).
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] on query failure.
    pub async fn keys(&self, table: &TableSpec) -> Result<Vec<String>, DestinationError> {
        let conn = self.conn.lock().await;
        select_keys(&conn, table).map_err(|e| DestinationError::new("select", table.name, e.to_string()))
    }
}

fn select_keys(conn: &Connection, table: &TableSpec) -> rusqlite::Result<Vec<String>> {
    let qualified = sql::qualified_table(None, table);
    let key = table.key;
    let mut stmt = conn.prepare(&format!(
        "SELECT \"{key}\" FROM {qualified} ORDER BY \"{key}\""
    ))?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

fn filter_params(filter: Option<&ColumnFilter>) -> Vec<rusqlite::types::Value> {
    filter
        .map(|f| vec![rusqlite::types::Value::Text(f.value.clone())])
        .unwrap_or_default()
}

fn query_latest(
    conn: &Connection,
    table: &TableSpec,
    columns: &[&'static str],
    filter: Option<&ColumnFilter>,
) -> rusqlite::Result<Option<Vec<SqlValue>>> {
    let qualified = sql::qualified_table(None, table);
    let statement = sql::latest_row(
        Dialect::Sqlite,
        &qualified,
        table,
        columns,
        filter.map(|f| f.column),
    );
    let mut stmt = conn.prepare(&statement)?;
    stmt.query_row(rusqlite::params_from_iter(filter_params(filter)), |row| {
        columns
            .iter()
            .enumerate()
            .map(|(idx, name)| read_value(row, idx, table.column(name).map(|c| c.ty)))
            .collect::<rusqlite::Result<Vec<_>>>()
    })
    .optional()
}

fn query_sums(
    conn: &Connection,
    table: &TableSpec,
    columns: &[&'static str],
    filter: Option<&ColumnFilter>,
) -> rusqlite::Result<Vec<f64>> {
    let qualified = sql::qualified_table(None, table);
    let statement = sql::column_sums(Dialect::Sqlite, &qualified, columns, filter.map(|f| f.column));
    conn.query_row(&statement, rusqlite::params_from_iter(filter_params(filter)), |row| {
        (0..columns.len())
            .map(|idx| row.get::<_, f64>(idx))
            .collect::<rusqlite::Result<Vec<_>>>()
    })
}

fn query_window(
    conn: &Connection,
    table: &TableSpec,
    value_column: &'static str,
    start_ms: i64,
    end_ms: i64,
) -> rusqlite::Result<WindowStats> {
    let qualified = sql::qualified_table(None, table);
    let statement = sql::window_stats(Dialect::Sqlite, &qualified, table, value_column);
    conn.query_row(
        &statement,
        rusqlite::params![format_warehouse(start_ms), format_warehouse(end_ms)],
        |row| {
            Ok(WindowStats {
                count: row.get(0)?,
                sum: row.get(1)?,
                avg: row.get(2)?,
                min: row.get(3)?,
                max: row.get(4)?,
                first_ms: read_timestamp(row, 5)?,
                last_ms: read_timestamp(row, 6)?,
            })
        },
    )
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    async fn acquire(&self) -> Result<Box<dyn WarehouseSession>, DestinationError> {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        Ok(Box::new(SqliteSession::new(guard)))
    }

    async fn ensure_table(&self, table: &TableSpec) -> Result<(), DestinationError> {
        let conn = self.conn.lock().await;
        let qualified = sql::qualified_table(None, table);
        let ddl = format!(
            "{};\n{};",
            sql::create_table(Dialect::Sqlite, &qualified, table),
            sql::create_timestamp_index(&qualified, table)
        );
        conn.execute_batch(&ddl)
            .map_err(|e| DestinationError::new("create table", table.name, e.to_string()))?;
        tracing::debug!(table = table.name, "dest-sqlite: table ready");
        Ok(())
    }

    async fn latest_values(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Option<Vec<SqlValue>>, DestinationError> {
        let conn = self.conn.lock().await;
        query_latest(&conn, table, columns, filter)
            .map_err(|e| DestinationError::new("select latest", table.name, e.to_string()))
    }

    async fn column_sums(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Vec<f64>, DestinationError> {
        let conn = self.conn.lock().await;
        query_sums(&conn, table, columns, filter)
            .map_err(|e| DestinationError::new("select sums", table.name, e.to_string()))
    }

    async fn window_stats(
        &self,
        table: &TableSpec,
        value_column: &'static str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<WindowStats, DestinationError> {
        let conn = self.conn.lock().await;
        query_window(&conn, table, value_column, start_ms, end_ms)
            .map_err(|e| DestinationError::new("select window", table.name, e.to_string()))
    }

    async fn validate(&self) -> ValidationResult {
        let conn = self.conn.lock().await;
        match conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)) {
            Ok(version) => ValidationResult::success(format!("SQLite {version}")),
            Err(e) => ValidationResult::failed(format!("SQLite probe failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::row::{AssetFlow, CanonicalRow, FeeTotal, FEE_TOTAL, NAVI_DEPOSIT};

    fn fee(id: &str, ts: i64, value: f64) -> Vec<SqlValue> {
        CanonicalRow::FeeTotal(FeeTotal {
            id: id.into(),
            coin: Some("BUCK".into()),
            fee_value: Some(value),
            timestamp_ms: ts,
            transaction_hash: None,
            service: Some("borrow".into()),
        })
        .values()
    }

    fn flow(event_id: &str, ts: i64, change: f64, acc: f64) -> Vec<SqlValue> {
        CanonicalRow::AssetFlow(AssetFlow {
            event_id: event_id.into(),
            timestamp_ms: ts,
            sender: "0xs".into(),
            transaction_hash: event_id.trim_end_matches(char::is_numeric).into(),
            asset: "BUCK".into(),
            asset_change: change,
            accumulation: acc,
        })
        .values()
    }

    async fn insert(wh: &SqliteWarehouse, table: &TableSpec, rows: &[Vec<SqlValue>]) -> u64 {
        let mut session = wh.acquire().await.unwrap();
        session.begin().await.unwrap();
        let n = session.insert_rows(table, rows).await.unwrap();
        session.commit().await.unwrap();
        n
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&FEE_TOTAL).await.unwrap();
        wh.ensure_table(&FEE_TOTAL).await.unwrap();
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn latest_values_orders_by_time_then_sequence() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&NAVI_DEPOSIT).await.unwrap();
        insert(
            &wh,
            &NAVI_DEPOSIT,
            &[
                flow("digestA9", 1_000, 1.0, 1.0),
                flow("digestA10", 1_000, 2.0, 3.0),
                flow("digestB0", 500, 4.0, 7.0),
            ],
        )
        .await;

        let latest = wh
            .latest_values(&NAVI_DEPOSIT, &["event_id", "transaction_hash", "timestamp"], None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest[0].as_text(), Some("digestA10"));
        assert_eq!(latest[1].as_text(), Some("digestA"));
        assert_eq!(latest[2].as_timestamp_ms(), Some(1_000));
    }

    #[tokio::test]
    async fn latest_values_on_empty_table_is_none() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&NAVI_DEPOSIT).await.unwrap();
        let latest = wh
            .latest_values(&NAVI_DEPOSIT, &["event_id"], None)
            .await
            .unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn column_sums_default_to_zero_and_add_up() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&NAVI_DEPOSIT).await.unwrap();
        assert_eq!(
            wh.column_sums(&NAVI_DEPOSIT, &["asset_change"], None).await.unwrap(),
            vec![0.0]
        );
        insert(
            &wh,
            &NAVI_DEPOSIT,
            &[flow("d1", 1, 1.5, 1.5), flow("d2", 2, 2.5, 4.0)],
        )
        .await;
        assert_eq!(
            wh.column_sums(&NAVI_DEPOSIT, &["asset_change"], None).await.unwrap(),
            vec![4.0]
        );
        let filtered = wh
            .column_sums(
                &NAVI_DEPOSIT,
                &["asset_change"],
                Some(&ColumnFilter::new("event_id", "d2")),
            )
            .await
            .unwrap();
        assert_eq!(filtered, vec![2.5]);
    }

    #[tokio::test]
    async fn window_stats_is_half_open() {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&FEE_TOTAL).await.unwrap();
        insert(
            &wh,
            &FEE_TOTAL,
            &[fee("1", 1_000, 1.0), fee("2", 2_000, 3.0), fee("3", 3_000, 100.0)],
        )
        .await;

        let stats = wh.window_stats(&FEE_TOTAL, "fee_value", 1_000, 3_000).await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.sum, Some(4.0));
        assert_eq!(stats.avg, Some(2.0));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(3.0));
        assert_eq!(stats.first_ms, Some(1_000));
        assert_eq!(stats.last_ms, Some(2_000));

        let empty = wh.window_stats(&FEE_TOTAL, "fee_value", 10_000, 20_000).await.unwrap();
        assert_eq!(empty, WindowStats::default());
    }

    #[tokio::test]
    async fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wh").join("warehouse.db");
        {
            let wh = SqliteWarehouse::open(&path).unwrap();
            wh.ensure_table(&FEE_TOTAL).await.unwrap();
            insert(&wh, &FEE_TOTAL, &[fee("1", 1, 1.0)]).await;
        }
        let wh = SqliteWarehouse::from_config(&Config {
            path: Some(path.clone()),
        })
        .unwrap();
        assert_eq!(wh.keys(&FEE_TOTAL).await.unwrap(), vec!["1".to_string()]);
        assert!(wh.validate().await.is_success());
    }
}
