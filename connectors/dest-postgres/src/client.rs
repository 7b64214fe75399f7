//! PostgreSQL pool construction and validation helpers for dest-postgres.

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};

use tidemark_sdk::prelude::*;

use crate::config::Config;

pub(crate) fn format_pg_error(prefix: &str, error: &tokio_postgres::Error) -> String {
    if let Some(db_error) = error.as_db_error() {
        let detail = db_error.detail().unwrap_or("n/a");
        let hint = db_error.hint().unwrap_or("n/a");
        format!(
            "{prefix}: {} (sqlstate={} severity={} detail={} hint={})",
            db_error.message(),
            db_error.code().code(),
            db_error.severity(),
            detail,
            hint
        )
    } else {
        format!("{prefix}: {error}")
    }
}

/// Unique violation on `pg_type` raised when two sessions race on the same
/// `CREATE TABLE IF NOT EXISTS`.
fn is_pg_type_typname_race(code: &str, message: &str, detail: &str) -> bool {
    code == "23505"
        && (message.contains("pg_type_typname_nsp_index")
            || detail.contains("pg_type_typname_nsp_index"))
}

pub(crate) fn is_concurrent_create_race(error: &tokio_postgres::Error) -> bool {
    let Some(db_error) = error.as_db_error() else {
        return false;
    };

    is_pg_type_typname_race(
        db_error.code().code(),
        db_error.message(),
        db_error.detail().unwrap_or_default(),
    )
}

fn pg_config(config: &Config) -> PgConfig {
    let mut pg = PgConfig::new();
    pg.host(&config.host);
    pg.port(config.port);
    pg.user(&config.user);
    if !config.password.is_empty() {
        pg.password(&config.password);
    }
    pg.dbname(&config.database);
    pg.application_name("tidemark");
    pg
}

/// Build the bounded connection pool. No connection is opened until the
/// first checkout.
pub(crate) fn build_pool(config: &Config) -> Result<Pool, DestinationError> {
    let manager = Manager::from_config(
        pg_config(config),
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(config.max_connections)
        .build()
        .map_err(|e| DestinationError::new("connect", config.target(), e.to_string()))
}

/// Validate PostgreSQL connectivity and target schema.
pub(crate) async fn validate(pool: &Pool, config: &Config) -> ValidationResult {
    let client = match pool.get().await {
        Ok(client) => client,
        Err(e) => return ValidationResult::failed(format!("Connection failed: {e}")),
    };

    if let Err(e) = client.query_one("SELECT 1", &[]).await {
        return ValidationResult::failed(format_pg_error("Connection test failed", &e));
    }

    let schema_check = client
        .query_opt(
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1",
            &[&config.schema],
        )
        .await;

    match schema_check {
        Ok(Some(_)) => ValidationResult::success(format!("Connected to {}", config.target())),
        Ok(None) => ValidationResult::success(format!(
            "Connected to {}:{}/{} (schema '{}' does not exist, will be created)",
            config.host, config.port, config.database, config.schema
        )),
        Err(e) => ValidationResult::failed(format_pg_error("Schema check failed", &e)),
    }
}
