//! One borrowed `SQLite` connection.

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::OwnedMutexGuard;

use tidemark_sdk::prelude::*;
use tidemark_sdk::sql;

use crate::convert::bind_value;

/// Holds the connection lock until dropped. A transaction still open at
/// drop time is rolled back.
pub(crate) struct SqliteSession {
    conn: OwnedMutexGuard<Connection>,
    in_tx: bool,
}

impl SqliteSession {
    pub(crate) fn new(conn: OwnedMutexGuard<Connection>) -> Self {
        Self { conn, in_tx: false }
    }

    fn exec(&self, operation: &'static str, statement: &str) -> Result<(), DestinationError> {
        self.conn
            .execute_batch(statement)
            .map_err(|e| DestinationError::new(operation, "-", e.to_string()))
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.in_tx {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "dest-sqlite: rollback on release failed");
            }
        }
    }
}

fn select_existing(
    conn: &Connection,
    table: &TableSpec,
    keys: &[&str],
) -> rusqlite::Result<Vec<String>> {
    let qualified = sql::qualified_table(None, table);
    let statement = sql::key_lookup(Dialect::Sqlite, &qualified, table, keys.len());
    let mut stmt = conn.prepare(&statement)?;
    let found = stmt
        .query_map(rusqlite::params_from_iter(keys.iter()), |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(found)
}

fn insert_all(
    conn: &Connection,
    table: &TableSpec,
    rows: &[Vec<SqlValue>],
) -> rusqlite::Result<usize> {
    let qualified = sql::qualified_table(None, table);
    let statement = sql::multi_row_insert(Dialect::Sqlite, &qualified, table, rows.len());
    let params = rows.iter().flatten().map(bind_value);
    conn.execute(&statement, rusqlite::params_from_iter(params))
}

#[async_trait]
impl WarehouseSession for SqliteSession {
    async fn begin(&mut self) -> Result<(), DestinationError> {
        self.exec("begin", "BEGIN")?;
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DestinationError> {
        self.exec("commit", "COMMIT")?;
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DestinationError> {
        self.in_tx = false;
        self.exec("rollback", "ROLLBACK")
    }

    async fn existing_keys(
        &mut self,
        table: &TableSpec,
        keys: &[&str],
    ) -> Result<Vec<String>, DestinationError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        select_existing(&self.conn, table, keys)
            .map_err(|e| DestinationError::new("select keys", table.name, e.to_string()))
    }

    async fn insert_rows(
        &mut self,
        table: &TableSpec,
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, DestinationError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let inserted = insert_all(&self.conn, table, rows)
            .map_err(|e| DestinationError::new("insert", table.name, e.to_string()))?;
        Ok(inserted as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::SqliteWarehouse;
    use tidemark_sdk::prelude::*;
    use tidemark_types::row::{FeeTotal, FEE_TOTAL};

    fn fee(id: &str) -> Vec<SqlValue> {
        CanonicalRow::FeeTotal(FeeTotal {
            id: id.into(),
            coin: None,
            fee_value: Some(1.0),
            timestamp_ms: 1_000,
            transaction_hash: None,
            service: None,
        })
        .values()
    }

    async fn warehouse() -> SqliteWarehouse {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&FEE_TOTAL).await.unwrap();
        wh
    }

    #[tokio::test]
    async fn existing_keys_reports_only_stored_keys() {
        let wh = warehouse().await;
        let mut session = wh.acquire().await.unwrap();
        session.insert_rows(&FEE_TOTAL, &[fee("a"), fee("b")]).await.unwrap();
        let mut found = session
            .existing_keys(&FEE_TOTAL, &["a", "c", "b"])
            .await
            .unwrap();
        found.sort();
        assert_eq!(found, vec!["a".to_string(), "b".to_string()]);
        assert!(session.existing_keys(&FEE_TOTAL, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflicting_insert_is_ignored() {
        let wh = warehouse().await;
        let mut session = wh.acquire().await.unwrap();
        assert_eq!(session.insert_rows(&FEE_TOTAL, &[fee("a")]).await.unwrap(), 1);
        assert_eq!(
            session.insert_rows(&FEE_TOTAL, &[fee("a"), fee("b")]).await.unwrap(),
            1
        );
        drop(session);
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_inserts() {
        let wh = warehouse().await;
        let mut session = wh.acquire().await.unwrap();
        session.begin().await.unwrap();
        session.insert_rows(&FEE_TOTAL, &[fee("a")]).await.unwrap();
        session.rollback().await.unwrap();
        drop(session);
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropping_open_transaction_rolls_back_and_releases() {
        let wh = warehouse().await;
        {
            let mut session = wh.acquire().await.unwrap();
            session.begin().await.unwrap();
            session.insert_rows(&FEE_TOTAL, &[fee("a")]).await.unwrap();
        }
        // The lock is free again and nothing was persisted.
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 0);
        let mut again = wh.acquire().await.unwrap();
        again.begin().await.unwrap();
        again.commit().await.unwrap();
    }
}
