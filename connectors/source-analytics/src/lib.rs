//! Analytics SQL-over-HTTP source for tidemark.
//!
//! Each page is one `POST` of a SQL statement to the query API. Rows come
//! back as JSON objects and are decoded into the raw record of the stream's
//! kind. The adapter never retries; the driver retries whole streams.

pub mod config;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use tidemark_sdk::prelude::*;
use tidemark_types::event::{
    BottleCreatedRecord, BottleDestroyedRecord, BottleUpdatedRecord, FeeValueRecord,
    LiquidationRecord,
};
use tidemark_types::stream::Origin;

use crate::config::Config;

pub const CONNECTOR_NAME: &str = "source-analytics";

/// Longest body excerpt carried in an error.
const BODY_PREVIEW_LIMIT: usize = 2_000;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    rows: Vec<Value>,
}

/// Analytics query API client.
pub struct AnalyticsSource {
    client: reqwest::Client,
    config: Config,
}

impl AnalyticsSource {
    /// # Errors
    ///
    /// Returns a message if the config is invalid or the HTTP client can't
    /// be built.
    pub fn new(config: Config) -> Result<Self, String> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client, config })
    }

    /// Run one SQL statement and return its raw rows.
    async fn execute(&self, sql: &str, size: usize) -> Result<Vec<Value>, SourceError> {
        let body = json!({ "sqlQuery": { "sql": sql, "size": size } });
        let response = self
            .client
            .post(&self.config.url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::unavailable(1, format!("analytics request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::unavailable(1, format!("analytics response read failed: {e}")))?;

        if !status.is_success() {
            return Err(SourceError::upstream_status(status.as_u16(), preview(&text)));
        }

        let decoded: QueryResponse = serde_json::from_str(&text).map_err(|e| SourceError::Upstream {
            status: Some(status.as_u16()),
            message: format!("undecodable analytics response: {e}"),
            body: Some(preview(&text)),
        })?;
        Ok(decoded.result.rows)
    }
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LIMIT {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} bytes total)", &text[..end], text.len())
}

fn decode_row<T, F>(row: Value, index: usize, wrap: F) -> Result<RawEvent, SourceError>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> RawEvent,
{
    let body = row.to_string();
    serde_json::from_value::<T>(row)
        .map(wrap)
        .map_err(|e| SourceError::Upstream {
            status: None,
            message: format!("undecodable row {index}: {e}"),
            body: Some(preview(&body)),
        })
}

/// Decode the rows of one page into the raw records of `kind`.
///
/// # Errors
///
/// Returns [`SourceError::Upstream`] naming the first row that doesn't fit.
pub fn decode_rows(kind: StreamKind, rows: Vec<Value>) -> Result<Vec<RawEvent>, SourceError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match kind {
            StreamKind::BottleCreated => {
                decode_row::<BottleCreatedRecord, _>(row, index, RawEvent::BottleCreated)
            }
            StreamKind::BottleUpdated => {
                decode_row::<BottleUpdatedRecord, _>(row, index, RawEvent::BottleUpdated)
            }
            StreamKind::BottleDestroyed => {
                decode_row::<BottleDestroyedRecord, _>(row, index, RawEvent::BottleDestroyed)
            }
            StreamKind::BottleLiquidated => {
                decode_row::<LiquidationRecord, _>(row, index, RawEvent::Liquidation)
            }
            StreamKind::FeeTotal => decode_row::<FeeValueRecord, _>(row, index, RawEvent::FeeValue),
            other => Err(SourceError::upstream(format!(
                "{other} is not an analytics stream"
            ))),
        })
        .collect()
}

#[async_trait]
impl Source for AnalyticsSource {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn supports(&self, stream: &StreamSpec) -> bool {
        stream.kind.origin() == Origin::Analytics && query::page_query(stream, None).is_some()
    }

    async fn fetch_page(
        &self,
        stream: &StreamSpec,
        request: PageRequest,
    ) -> Result<Page, SourceError> {
        let sql = query::page_query(stream, request.from_ms)
            .ok_or_else(|| SourceError::upstream(format!("{stream} can't be served by {CONNECTOR_NAME}")))?;
        tracing::debug!(stream = %stream, sql = %sql, "source-analytics: querying");

        let rows = self.execute(&sql, self.config.page_size).await?;
        let events = decode_rows(stream.kind, rows)?;
        tracing::info!(
            stream = %stream,
            rows = events.len(),
            from_ms = ?request.from_ms,
            "source-analytics: page fetched"
        );
        Ok(Page::unfiltered(events))
    }

    async fn validate(&self) -> ValidationResult {
        match self.execute("SELECT * FROM Total_Fee_Value_From LIMIT 1", 1).await {
            Ok(_) => ValidationResult::success(format!("Query API reachable at {}", self.config.url)),
            Err(e) => ValidationResult::failed(format!("Query API check failed: {e}")),
        }
    }
}
