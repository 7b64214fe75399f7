//! One pooled Postgres connection.

use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio_postgres::types::ToSql;

use tidemark_sdk::prelude::*;
use tidemark_sdk::sql;

use crate::client::format_pg_error;
use crate::param::SqlParamValue;

/// Pooled client lent out by [`crate::PostgresWarehouse::acquire`].
///
/// Dropped with a transaction still open, the connection is detached from
/// the pool and closed, which makes the server abort the transaction.
pub(crate) struct PostgresSession {
    client: Option<Object>,
    schema: String,
    in_tx: bool,
}

impl PostgresSession {
    pub(crate) fn new(client: Object, schema: String) -> Self {
        Self {
            client: Some(client),
            schema,
            in_tx: false,
        }
    }

    fn client(&self) -> Result<&Object, DestinationError> {
        self.client
            .as_ref()
            .ok_or_else(|| DestinationError::new("session", "-", "connection already released"))
    }

    fn qualified(&self, table: &TableSpec) -> String {
        sql::qualified_table(Some(&self.schema), table)
    }

    async fn control(&self, operation: &'static str, statement: &str) -> Result<(), DestinationError> {
        self.client()?
            .batch_execute(statement)
            .await
            .map_err(|e| DestinationError::new(operation, "-", format_pg_error(statement, &e)))
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        if self.in_tx {
            if let Some(client) = self.client.take() {
                tracing::warn!("dest-postgres: session released mid-transaction, closing connection");
                drop(Object::take(client));
            }
        }
    }
}

#[async_trait]
impl WarehouseSession for PostgresSession {
    async fn begin(&mut self) -> Result<(), DestinationError> {
        self.control("begin", "BEGIN").await?;
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DestinationError> {
        self.control("commit", "COMMIT").await?;
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DestinationError> {
        self.control("rollback", "ROLLBACK").await?;
        self.in_tx = false;
        Ok(())
    }

    async fn existing_keys(
        &mut self,
        table: &TableSpec,
        keys: &[&str],
    ) -> Result<Vec<String>, DestinationError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let statement = sql::key_lookup(Dialect::Postgres, &self.qualified(table), table, keys.len());
        let params: Vec<&(dyn ToSql + Sync)> =
            keys.iter().map(|k| k as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client()?
            .query(statement.as_str(), &params)
            .await
            .map_err(|e| {
                DestinationError::new("select keys", table.name, format_pg_error("key lookup failed", &e))
            })?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
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
        let statement = sql::multi_row_insert(Dialect::Postgres, &self.qualified(table), table, rows.len());
        let params: Vec<SqlParamValue<'_>> = rows.iter().flatten().map(SqlParamValue::from).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(SqlParamValue::as_tosql).collect();

        self.client()?
            .execute(statement.as_str(), &param_refs)
            .await
            .map_err(|e| {
                DestinationError::new(
                    "insert",
                    table.name,
                    format_pg_error(&format!("INSERT of {} rows failed", rows.len()), &e),
                )
            })
    }
}
