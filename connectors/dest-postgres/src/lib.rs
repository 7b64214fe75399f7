//! Postgres warehouse for tidemark.
//!
//! Connections come from a bounded `deadpool-postgres` pool. Every session
//! goes back to the pool when it is dropped, whatever path the caller took.

mod client;
pub mod config;
mod param;
mod session;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use pg_escape::quote_identifier;
use tokio_postgres::types::ToSql;

use tidemark_sdk::prelude::*;
use tidemark_sdk::sql;
use tidemark_types::watermark::to_naive_utc;

use crate::client::{format_pg_error, is_concurrent_create_race};
use crate::config::Config;
use crate::param::{read_timestamp, read_value};
use crate::session::PostgresSession;

pub const CONNECTOR_NAME: &str = "dest-postgres";

/// Postgres-backed [`Warehouse`].
pub struct PostgresWarehouse {
    pool: Pool,
    config: Config,
}

impl PostgresWarehouse {
    /// Build the pool. Connections are opened lazily.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the config is invalid or the pool
    /// can't be built.
    pub fn new(config: Config) -> Result<Self, DestinationError> {
        config
            .validate()
            .map_err(|e| DestinationError::new("config", config.target(), e))?;
        let pool = client::build_pool(&config)?;
        Ok(Self { pool, config })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn qualified(&self, table: &TableSpec) -> String {
        sql::qualified_table(Some(&self.config.schema), table)
    }

    async fn checkout(&self, table: &str) -> Result<deadpool_postgres::Object, DestinationError> {
        self.pool
            .get()
            .await
            .map_err(|e| DestinationError::new("acquire", table, e.to_string()))
    }
}

fn filter_param(filter: Option<&ColumnFilter>) -> Vec<&(dyn ToSql + Sync)> {
    filter
        .map(|f| vec![&f.value as &(dyn ToSql + Sync)])
        .unwrap_or_default()
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    async fn acquire(&self) -> Result<Box<dyn WarehouseSession>, DestinationError> {
        let client = self.checkout("-").await?;
        Ok(Box::new(PostgresSession::new(
            client,
            self.config.schema.clone(),
        )))
    }

    async fn ensure_table(&self, table: &TableSpec) -> Result<(), DestinationError> {
        let client = self.checkout(table.name).await?;
        let qualified = self.qualified(table);

        let create_schema = format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_identifier(&self.config.schema)
        );
        client.batch_execute(&create_schema).await.map_err(|e| {
            DestinationError::new(
                "create schema",
                table.name,
                format_pg_error(&format!("Failed to create schema '{}'", self.config.schema), &e),
            )
        })?;

        let ddl = sql::create_table(Dialect::Postgres, &qualified, table);
        if let Err(e) = client.batch_execute(&ddl).await {
            if is_concurrent_create_race(&e) {
                tracing::debug!(
                    table = table.name,
                    "dest-postgres: table created concurrently by another session"
                );
            } else {
                return Err(DestinationError::new(
                    "create table",
                    table.name,
                    format_pg_error(&format!("Failed to create table {qualified}"), &e),
                ));
            }
        }

        let index = sql::create_timestamp_index(&qualified, table);
        client.batch_execute(&index).await.map_err(|e| {
            DestinationError::new(
                "create index",
                table.name,
                format_pg_error("Failed to create timestamp index", &e),
            )
        })?;

        tracing::debug!(table = %qualified, "dest-postgres: table ready");
        Ok(())
    }

    async fn latest_values(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Option<Vec<SqlValue>>, DestinationError> {
        let client = self.checkout(table.name).await?;
        let statement = sql::latest_row(
            Dialect::Postgres,
            &self.qualified(table),
            table,
            columns,
            filter.map(|f| f.column),
        );
        let params = filter_param(filter);
        let row = client
            .query_opt(statement.as_str(), &params)
            .await
            .map_err(|e| {
                DestinationError::new("select latest", table.name, format_pg_error("latest row query failed", &e))
            })?;
        let Some(row) = row else {
            return Ok(None);
        };
        columns
            .iter()
            .enumerate()
            .map(|(idx, name)| read_value(&row, idx, table.column(name).map(|c| c.ty)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
            .map_err(|e| DestinationError::new("select latest", table.name, e.to_string()))
    }

    async fn column_sums(
        &self,
        table: &TableSpec,
        columns: &[&'static str],
        filter: Option<&ColumnFilter>,
    ) -> Result<Vec<f64>, DestinationError> {
        let client = self.checkout(table.name).await?;
        let statement = sql::column_sums(
            Dialect::Postgres,
            &self.qualified(table),
            columns,
            filter.map(|f| f.column),
        );
        let params = filter_param(filter);
        let row = client
            .query_one(statement.as_str(), &params)
            .await
            .map_err(|e| {
                DestinationError::new("select sums", table.name, format_pg_error("sum query failed", &e))
            })?;
        (0..columns.len())
            .map(|idx| row.try_get::<_, f64>(idx))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DestinationError::new("select sums", table.name, e.to_string()))
    }

    async fn window_stats(
        &self,
        table: &TableSpec,
        value_column: &'static str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<WindowStats, DestinationError> {
        let client = self.checkout(table.name).await?;
        let statement = sql::window_stats(Dialect::Postgres, &self.qualified(table), table, value_column);
        let (start, end) = (to_naive_utc(start_ms), to_naive_utc(end_ms));
        let row = client
            .query_one(statement.as_str(), &[&start, &end])
            .await
            .map_err(|e| {
                DestinationError::new("select window", table.name, format_pg_error("window query failed", &e))
            })?;
        let stats = || -> Result<WindowStats, tokio_postgres::Error> {
            Ok(WindowStats {
                count: row.try_get(0)?,
                sum: row.try_get(1)?,
                avg: row.try_get(2)?,
                min: row.try_get(3)?,
                max: row.try_get(4)?,
                first_ms: read_timestamp(&row, 5)?,
                last_ms: read_timestamp(&row, 6)?,
            })
        };
        stats().map_err(|e| DestinationError::new("select window", table.name, e.to_string()))
    }

    async fn validate(&self) -> ValidationResult {
        client::validate(&self.pool, &self.config).await
    }
}
