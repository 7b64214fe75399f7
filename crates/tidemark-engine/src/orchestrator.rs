//! Pipeline orchestrator: plans streams, opens connectors and state, and
//! hands the streams to the driver.

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;

use tidemark_sdk::warehouse::Warehouse;
use tidemark_types::row::{CanonicalRow, PoolSnapshot, TableSpec, NAVI_POOL};

use crate::config::types::PipelineConfig;
use crate::dedup::upsert_batch;
use crate::driver::Driver;
use crate::plan::{plan_streams, select_streams};
use crate::resolve::{check_state, open_chain, open_sources, open_state, open_warehouse};
use crate::result::{CheckResult, RunReport};

/// Per-invocation options of a sync run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Start timestamp-paginated streams here instead of their watermark.
    pub from_ms: Option<i64>,
    /// Stream names or kinds to run; empty runs every planned stream.
    pub streams: Vec<String>,
    pub shutdown: Option<watch::Receiver<bool>>,
}

/// Create every table the streams write to, once per table.
async fn ensure_tables<'a>(
    warehouse: &dyn Warehouse,
    tables: impl IntoIterator<Item = &'a TableSpec>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for table in tables {
        if seen.insert(table.name) {
            warehouse.ensure_table(table).await?;
        }
    }
    Ok(())
}

/// Run every selected stream of a validated pipeline.
///
/// Stream failures don't fail the run; they are reported per stream.
///
/// # Errors
///
/// Fails if planning, stream selection, table creation or opening a
/// connector or the state backend fails.
pub async fn run_pipeline(config: &PipelineConfig, options: &RunOptions) -> Result<RunReport> {
    let planned = plan_streams(config)?;
    let streams = select_streams(planned, &options.streams)?;
    tracing::info!(
        streams = streams.len(),
        from_ms = options.from_ms,
        "Starting pipeline"
    );

    let warehouse = open_warehouse(&config.destination)?;
    ensure_tables(warehouse.as_ref(), streams.iter().map(|s| s.table()))
        .await
        .context("Failed to create destination tables")?;
    let store = open_state(&config.state)?;
    let sources = open_sources(config)?;

    let mut driver = Driver::new(sources, warehouse, store)
        .with_retry(config.retry.clone())
        .with_parallelism(config.parallelism)
        .with_start(options.from_ms);
    if let Some(rx) = options.shutdown.clone() {
        driver = driver.with_shutdown(rx);
    }
    Ok(driver.run(streams).await)
}

/// Probe the state backend, the destination and every configured source.
///
/// # Errors
///
/// Fails if a connector can't be constructed from its config.
pub async fn check_pipeline(config: &PipelineConfig) -> Result<CheckResult> {
    tracing::info!(
        destination = config.destination.use_ref.as_str(),
        streams = config.streams.len(),
        "Checking pipeline configuration"
    );

    let state_ok = check_state(&config.state);

    let warehouse = open_warehouse(&config.destination)?;
    let destination = warehouse.validate().await;

    let mut sources = Vec::new();
    for source in open_sources(config)? {
        let result = source.validate().await;
        sources.push((source.name().to_string(), result));
    }

    Ok(CheckResult {
        sources,
        destination,
        state_ok,
    })
}

/// Read Navi's BUCK pool balance and store it as one snapshot row.
///
/// Returns the snapshot and whether it was new to the warehouse.
///
/// # Errors
///
/// Fails if the chain read or the insert fails.
pub async fn capture_pool_snapshot(config: &PipelineConfig) -> Result<(PoolSnapshot, bool)> {
    let warehouse = open_warehouse(&config.destination)?;
    warehouse.ensure_table(&NAVI_POOL).await?;

    let chain = open_chain(config)?;
    let snapshot = chain
        .navi_pool_snapshot()
        .await
        .map_err(|e| anyhow!("Pool snapshot failed: {e}"))?;
    let rows = [CanonicalRow::PoolSnapshot(snapshot.clone())];
    let inserted = upsert_batch(warehouse.as_ref(), &NAVI_POOL, &rows)
        .await?
        .unwrap_or(0);
    tracing::info!(
        pool = snapshot.pool.as_str(),
        balance = snapshot.balance,
        inserted,
        "Pool snapshot stored"
    );
    Ok((snapshot, inserted > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_pipeline_str;

    #[tokio::test]
    async fn test_check_reports_each_component() {
        let dir = tempfile::tempdir().unwrap();
        let config = parse_pipeline_str(&format!(
            r#"
version: "1.0"
state:
  backend: sqlite
  path: "{}"
destination: {{ use: dest-sqlite }}
chain: {{ rpc_url: "http://127.0.0.1:9", max_retries: 1, retry_delay_ms: 1, timeout_secs: 2 }}
streams: [navi_deposit]
"#,
            dir.path().join("wm.db").display()
        ))
        .unwrap();
        let check = check_pipeline(&config).await.unwrap();
        assert!(check.state_ok);
        assert!(check.destination.is_success());
        assert_eq!(check.sources.len(), 1);
        assert_eq!(check.sources[0].0, source_sui::CONNECTOR_NAME);
        assert!(!check.sources[0].1.is_success());
        assert!(!check.is_success());
    }

    #[tokio::test]
    async fn test_unknown_stream_selection_fails_before_connecting() {
        let config = parse_pipeline_str(
            r#"
version: "1.0"
destination: { use: dest-sqlite }
chain: {}
streams: [navi_deposit]
"#,
        )
        .unwrap();
        let options = RunOptions {
            streams: vec!["Navi_Withdraw".into()],
            ..RunOptions::default()
        };
        let err = run_pipeline(&config, &options).await.unwrap_err().to_string();
        assert!(err.contains("Navi_Withdraw"));
    }
}
