//! Check-then-insert of canonical rows.
//!
//! Inside one transaction: look up which keys already exist, drop those
//! rows, insert the rest with multi-row statements. The warehouse's
//! primary key with `ON CONFLICT DO NOTHING` is only a backstop.

use std::collections::HashSet;

use tidemark_sdk::warehouse::{Warehouse, WarehouseSession};
use tidemark_types::errors::DestinationError;
use tidemark_types::row::{CanonicalRow, SqlValue, TableSpec};

/// Keys per existence lookup.
pub const LOOKUP_CHUNK: usize = 1000;

/// Rows per multi-row `INSERT`.
pub const INSERT_CHUNK: usize = 1000;

/// Insert the rows of `rows` whose key is not in `table` yet.
///
/// Returns `None` when there was nothing new to insert, otherwise the
/// number of rows the warehouse reported inserted.
///
/// # Errors
///
/// Returns [`DestinationError`] if any lookup or insert fails. The
/// transaction is rolled back and nothing from this call is persisted.
pub async fn upsert_batch(
    warehouse: &dyn Warehouse,
    table: &TableSpec,
    rows: &[CanonicalRow],
) -> Result<Option<u64>, DestinationError> {
    upsert_batch_with(warehouse, table, rows, |_| {}).await
}

/// Like [`upsert_batch`], but `prepare` sees the new rows, in input order,
/// right before they are inserted.
///
/// # Errors
///
/// See [`upsert_batch`].
pub async fn upsert_batch_with<F>(
    warehouse: &dyn Warehouse,
    table: &TableSpec,
    rows: &[CanonicalRow],
    prepare: F,
) -> Result<Option<u64>, DestinationError>
where
    F: FnOnce(&mut [CanonicalRow]) + Send,
{
    if rows.is_empty() {
        return Ok(None);
    }

    let mut seen = HashSet::with_capacity(rows.len());
    let unique: Vec<&CanonicalRow> = rows.iter().filter(|r| seen.insert(r.key())).collect();
    if unique.len() < rows.len() {
        tracing::debug!(
            table = table.name,
            duplicates = rows.len() - unique.len(),
            "Collapsed duplicate keys within batch"
        );
    }

    let mut session = warehouse.acquire().await?;
    session.begin().await?;

    match insert_new(session.as_mut(), table, &unique, prepare).await {
        Ok(Some(inserted)) => {
            session.commit().await?;
            tracing::debug!(table = table.name, inserted, "Batch committed");
            Ok(Some(inserted))
        }
        Ok(None) => {
            rollback_quietly(session.as_mut(), table).await;
            tracing::debug!(table = table.name, rows = unique.len(), "All rows already present");
            Ok(None)
        }
        Err(err) => {
            tracing::error!(table = table.name, error = %err, "Batch failed, rolling back");
            rollback_quietly(session.as_mut(), table).await;
            Err(err)
        }
    }
}

async fn rollback_quietly(session: &mut dyn WarehouseSession, table: &TableSpec) {
    if let Err(e) = session.rollback().await {
        tracing::warn!(table = table.name, error = %e, "Rollback failed");
    }
}

async fn insert_new<F>(
    session: &mut dyn WarehouseSession,
    table: &TableSpec,
    rows: &[&CanonicalRow],
    prepare: F,
) -> Result<Option<u64>, DestinationError>
where
    F: FnOnce(&mut [CanonicalRow]) + Send,
{
    let mut existing: HashSet<String> = HashSet::new();
    for chunk in rows.chunks(LOOKUP_CHUNK) {
        let keys: Vec<&str> = chunk.iter().map(|r| r.key()).collect();
        existing.extend(session.existing_keys(table, &keys).await?);
    }

    let mut new_rows: Vec<CanonicalRow> = rows
        .iter()
        .filter(|r| !existing.contains(r.key()))
        .map(|r| (*r).clone())
        .collect();
    if new_rows.is_empty() {
        return Ok(None);
    }
    prepare(&mut new_rows);

    let mut inserted = 0u64;
    for chunk in new_rows.chunks(INSERT_CHUNK) {
        let values: Vec<Vec<SqlValue>> = chunk.iter().map(CanonicalRow::values).collect();
        inserted += session.insert_rows(table, &values).await?;
    }
    Ok(Some(inserted))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use dest_sqlite::SqliteWarehouse;
    use tidemark_sdk::warehouse::{ColumnFilter, WindowStats};
    use tidemark_types::row::{FeeTotal, FEE_TOTAL};

    use super::*;

    fn fee(id: &str, ts: i64) -> CanonicalRow {
        CanonicalRow::FeeTotal(FeeTotal {
            id: id.into(),
            coin: Some("BUCK".into()),
            fee_value: Some(1.0),
            timestamp_ms: ts,
            transaction_hash: None,
            service: None,
        })
    }

    async fn warehouse() -> SqliteWarehouse {
        let wh = SqliteWarehouse::in_memory().unwrap();
        wh.ensure_table(&FEE_TOTAL).await.unwrap();
        wh
    }

    #[tokio::test]
    async fn second_identical_batch_inserts_nothing() {
        let wh = warehouse().await;
        let rows = vec![fee("a", 1), fee("b", 2)];
        assert_eq!(upsert_batch(&wh, &FEE_TOTAL, &rows).await.unwrap(), Some(2));
        assert_eq!(upsert_batch(&wh, &FEE_TOTAL, &rows).await.unwrap(), None);
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn only_unseen_keys_are_inserted() {
        let wh = warehouse().await;
        upsert_batch(&wh, &FEE_TOTAL, &[fee("a", 1)]).await.unwrap();
        let inserted = upsert_batch(&wh, &FEE_TOTAL, &[fee("a", 1), fee("c", 3)])
            .await
            .unwrap();
        assert_eq!(inserted, Some(1));
        assert_eq!(wh.keys(&FEE_TOTAL).await.unwrap(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn duplicate_keys_in_batch_keep_first() {
        let wh = warehouse().await;
        let inserted = upsert_batch(&wh, &FEE_TOTAL, &[fee("a", 1), fee("a", 99)])
            .await
            .unwrap();
        assert_eq!(inserted, Some(1));
        let latest = wh
            .latest_values(&FEE_TOTAL, &["timestamp"], None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest[0], SqlValue::Timestamp(1));
    }

    #[tokio::test]
    async fn large_batches_span_chunks() {
        let wh = warehouse().await;
        let rows: Vec<_> = (0..2_500).map(|i| fee(&format!("k{i}"), i)).collect();
        assert_eq!(upsert_batch(&wh, &FEE_TOTAL, &rows).await.unwrap(), Some(2_500));
        assert_eq!(upsert_batch(&wh, &FEE_TOTAL, &rows).await.unwrap(), None);
        assert_eq!(wh.count_rows(&FEE_TOTAL).await.unwrap(), 2_500);
    }

    #[tokio::test]
    async fn prepare_sees_only_new_rows() {
        let wh = warehouse().await;
        upsert_batch(&wh, &FEE_TOTAL, &[fee("a", 1)]).await.unwrap();
        let mut seen = Vec::new();
        upsert_batch_with(&wh, &FEE_TOTAL, &[fee("a", 1), fee("b", 2)], |rows| {
            seen.extend(rows.iter().map(|r| r.key().to_string()));
        })
        .await
        .unwrap();
        assert_eq!(seen, vec!["b"]);
    }

    // -----------------------------------------------------------------------
    // Failure path against a recording double
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Calls {
        acquired: usize,
        log: Vec<&'static str>,
    }

    struct FailingWarehouse {
        calls: Arc<Mutex<Calls>>,
    }

    struct FailingSession {
        calls: Arc<Mutex<Calls>>,
    }

    #[async_trait]
    impl WarehouseSession for FailingSession {
        async fn begin(&mut self) -> Result<(), DestinationError> {
            self.calls.lock().unwrap().log.push("begin");
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), DestinationError> {
            self.calls.lock().unwrap().log.push("commit");
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), DestinationError> {
            self.calls.lock().unwrap().log.push("rollback");
            Ok(())
        }

        async fn existing_keys(
            &mut self,
            _table: &TableSpec,
            _keys: &[&str],
        ) -> Result<Vec<String>, DestinationError> {
            self.calls.lock().unwrap().log.push("select");
            Ok(Vec::new())
        }

        async fn insert_rows(
            &mut self,
            table: &TableSpec,
            _rows: &[Vec<SqlValue>],
        ) -> Result<u64, DestinationError> {
            self.calls.lock().unwrap().log.push("insert");
            Err(DestinationError::new("insert", table.name, "disk full"))
        }
    }

    #[async_trait]
    impl Warehouse for FailingWarehouse {
        fn name(&self) -> &str {
            "failing"
        }

        async fn acquire(&self) -> Result<Box<dyn WarehouseSession>, DestinationError> {
            self.calls.lock().unwrap().acquired += 1;
            Ok(Box::new(FailingSession {
                calls: Arc::clone(&self.calls),
            }))
        }

        async fn ensure_table(&self, _table: &TableSpec) -> Result<(), DestinationError> {
            Ok(())
        }

        async fn latest_values(
            &self,
            _table: &TableSpec,
            _columns: &[&'static str],
            _filter: Option<&ColumnFilter>,
        ) -> Result<Option<Vec<SqlValue>>, DestinationError> {
            Ok(None)
        }

        async fn column_sums(
            &self,
            _table: &TableSpec,
            columns: &[&'static str],
            _filter: Option<&ColumnFilter>,
        ) -> Result<Vec<f64>, DestinationError> {
            Ok(vec![0.0; columns.len()])
        }

        async fn window_stats(
            &self,
            _table: &TableSpec,
            _value_column: &'static str,
            _start_ms: i64,
            _end_ms: i64,
        ) -> Result<WindowStats, DestinationError> {
            Ok(WindowStats::default())
        }
    }

    #[tokio::test]
    async fn insert_failure_rolls_back_and_propagates() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let wh = FailingWarehouse {
            calls: Arc::clone(&calls),
        };
        let err = upsert_batch(&wh, &FEE_TOTAL, &[fee("a", 1)]).await.unwrap_err();
        assert_eq!(err.operation, "insert");
        assert_eq!(
            calls.lock().unwrap().log,
            vec!["begin", "select", "insert", "rollback"]
        );
    }

    #[tokio::test]
    async fn empty_input_never_touches_the_pool() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let wh = FailingWarehouse {
            calls: Arc::clone(&calls),
        };
        assert_eq!(upsert_batch(&wh, &FEE_TOTAL, &[]).await.unwrap(), None);
        assert_eq!(calls.lock().unwrap().acquired, 0);
    }
}
