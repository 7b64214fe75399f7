//! Connector and state backend construction from pipeline config.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use dest_postgres::PostgresWarehouse;
use dest_sqlite::SqliteWarehouse;
use source_analytics::AnalyticsSource;
use source_sui::SuiSource;
use tidemark_sdk::source::Source;
use tidemark_sdk::warehouse::Warehouse;
use tidemark_state::{SqliteWatermarkStore, WatermarkStore, YamlWatermarkStore};

use crate::config::types::{DestinationConfig, PipelineConfig, StateBackendKind, StateConfig};

/// Open the configured watermark store.
///
/// # Errors
///
/// Fails if a `SQLite` store can't be opened.
pub fn open_state(config: &StateConfig) -> Result<Arc<dyn WatermarkStore>> {
    let path = config.resolved_path();
    match config.backend {
        StateBackendKind::Yaml => {
            Ok(Arc::new(YamlWatermarkStore::new(path)) as Arc<dyn WatermarkStore>)
        }
        StateBackendKind::Sqlite => {
            let store = SqliteWatermarkStore::open(&path)
                .with_context(|| format!("Failed to open state DB {}", path.display()))?;
            Ok(Arc::new(store) as Arc<dyn WatermarkStore>)
        }
    }
}

/// Open the state backend and read it once.
pub(crate) fn check_state(config: &StateConfig) -> bool {
    match open_state(config).and_then(|store| store.list().map_err(|e| anyhow!(e))) {
        Ok(_) => {
            tracing::info!("State backend: OK");
            true
        }
        Err(e) => {
            tracing::error!("State backend: FAILED: {e:#}");
            false
        }
    }
}

/// Open the configured destination warehouse.
///
/// # Errors
///
/// Fails on an unknown connector or a config it rejects.
pub fn open_warehouse(config: &DestinationConfig) -> Result<Arc<dyn Warehouse>> {
    match config.use_ref.as_str() {
        dest_postgres::CONNECTOR_NAME => {
            let settings: dest_postgres::config::Config = config
                .settings()
                .context("Invalid dest-postgres config")?;
            let warehouse = PostgresWarehouse::new(settings)?;
            Ok(Arc::new(warehouse) as Arc<dyn Warehouse>)
        }
        dest_sqlite::CONNECTOR_NAME => {
            let settings: dest_sqlite::config::Config =
                config.settings().context("Invalid dest-sqlite config")?;
            let warehouse = SqliteWarehouse::from_config(&settings)?;
            Ok(Arc::new(warehouse) as Arc<dyn Warehouse>)
        }
        other => bail!("Unknown destination connector '{other}'"),
    }
}

pub(crate) fn open_chain(config: &PipelineConfig) -> Result<SuiSource> {
    let chain = config.chain.clone().unwrap_or_default();
    SuiSource::new(chain).map_err(|e| anyhow!("Invalid chain config: {e}"))
}

/// Every source the config has a section for.
pub(crate) fn open_sources(config: &PipelineConfig) -> Result<Vec<Arc<dyn Source>>> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::with_capacity(2);
    if let Some(analytics) = config.analytics.clone() {
        let source =
            AnalyticsSource::new(analytics).map_err(|e| anyhow!("Invalid analytics config: {e}"))?;
        sources.push(Arc::new(source));
    }
    if config.chain.is_some() {
        sources.push(Arc::new(open_chain(config)?));
    }
    Ok(sources)
}
