//! Sui chain event source for tidemark.
//!
//! Pages through `suix_queryEvents` in ascending order from a cursor, keeps
//! the events that belong to the stream, and scales integer amounts by the
//! asset's decimals. RPC failures are retried here, a bounded number of
//! times, before the stream fails.

pub mod catalog;
pub mod config;
mod events;
mod rpc;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use tidemark_sdk::prelude::*;
use tidemark_types::row::PoolSnapshot;
use tidemark_types::stream::Origin;
use tidemark_types::watermark::now_millis;

use crate::config::Config;
use crate::events::EventPage;
use crate::rpc::RpcClient;

pub const CONNECTOR_NAME: &str = "source-sui";

/// Sui fullnode JSON-RPC client.
pub struct SuiSource {
    rpc: RpcClient,
    config: Config,
}

impl SuiSource {
    /// # Errors
    ///
    /// Returns a message if the config is invalid or the HTTP client can't
    /// be built.
    pub fn new(config: Config) -> Result<Self, String> {
        config.validate()?;
        let rpc = RpcClient::new(
            config.rpc_url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            config.retry_delay(),
        )?;
        Ok(Self { rpc, config })
    }

    /// Current balance of a pool object's `balance` field, in BUCK.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the object can't be read or has no
    /// integer `balance` field.
    pub async fn pool_balance(&self, object_id: &str) -> Result<f64, SourceError> {
        let object: Value = self
            .rpc
            .call(
                "sui_getObject",
                json!([object_id, { "showContent": true, "showType": true }]),
            )
            .await?;
        let raw = object
            .pointer("/data/content/fields/balance")
            .ok_or_else(|| SourceError::Upstream {
                status: None,
                message: format!("object {object_id} has no balance field"),
                body: Some(object.to_string()),
            })?;
        let base_units = match raw {
            Value::String(s) => s.parse::<u128>().ok(),
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        }
        .ok_or_else(|| SourceError::upstream(format!("object {object_id} balance is not an integer: {raw}")))?;
        Ok(catalog::scale(base_units, "BUCK"))
    }

    /// Snapshot of Navi's BUCK pool, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Propagates [`SuiSource::pool_balance`] failures.
    pub async fn navi_pool_snapshot(&self) -> Result<PoolSnapshot, SourceError> {
        let balance = self.pool_balance(catalog::NAVI_BUCK_POOL).await?;
        Ok(PoolSnapshot::new(
            catalog::NAVI_BUCK_POOL,
            "BUCK",
            balance,
            now_millis(),
        ))
    }
}

#[async_trait]
impl Source for SuiSource {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn supports(&self, stream: &StreamSpec) -> bool {
        stream.kind.origin() == Origin::Chain && events::query_filter(stream).is_some()
    }

    async fn fetch_page(
        &self,
        stream: &StreamSpec,
        request: PageRequest,
    ) -> Result<Page, SourceError> {
        let filter = events::query_filter(stream)
            .ok_or_else(|| SourceError::upstream(format!("{stream} can't be served by {CONNECTOR_NAME}")))?;
        let cursor = request.cursor.clone();
        let page: EventPage = self
            .rpc
            .call(
                "suix_queryEvents",
                json!([filter, cursor, self.config.page_limit, false]),
            )
            .await?;

        let scanned = page.data.len();
        let kept = events::convert(stream, &page.data);
        let next_cursor = if page.has_next_page { page.next_cursor } else { None };
        tracing::info!(
            stream = %stream,
            scanned,
            kept = kept.len(),
            has_next = next_cursor.is_some(),
            "source-sui: page fetched"
        );
        Ok(Page {
            events: kept,
            next_cursor,
            scanned,
        })
    }

    async fn validate(&self) -> ValidationResult {
        match self
            .rpc
            .call::<Value>("sui_getLatestCheckpointSequenceNumber", json!([]))
            .await
        {
            Ok(seq) => ValidationResult::success(format!(
                "Fullnode {} at checkpoint {seq}",
                self.config.rpc_url
            )),
            Err(e) => ValidationResult::failed(format!("Fullnode check failed: {e}")),
        }
    }
}
