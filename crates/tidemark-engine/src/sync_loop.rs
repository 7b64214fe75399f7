//! Per-stream pagination loop.
//!
//! Fetch a page, normalize it, dedup-insert it, then advance the stream's
//! watermark. The watermark is only written after the page's rows are
//! committed, so a crash re-fetches overlap instead of skipping rows.

use tokio::sync::watch;

use tidemark_sdk::source::{PageRequest, Source};
use tidemark_sdk::warehouse::{ColumnFilter, Warehouse};
use tidemark_state::WatermarkStore;
use tidemark_types::errors::SyncError;
use tidemark_types::event::EventCursor;
use tidemark_types::row::SqlValue;
use tidemark_types::stream::{Origin, Scope, StreamSpec};
use tidemark_types::watermark::{now_millis, Watermark};

use crate::accumulate::Accumulator;
use crate::dedup::{upsert_batch, upsert_batch_with};
use crate::normalize::normalize_page;
use crate::result::StreamSummary;

/// Loop state, traced at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fetching,
    Inserting,
    Advancing,
    Done,
}

/// Drains streams against one source, warehouse and watermark store.
pub struct StreamSync<'a> {
    source: &'a dyn Source,
    warehouse: &'a dyn Warehouse,
    store: &'a dyn WatermarkStore,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a> StreamSync<'a> {
    pub fn new(
        source: &'a dyn Source,
        warehouse: &'a dyn Warehouse,
        store: &'a dyn WatermarkStore,
    ) -> Self {
        Self {
            source,
            warehouse,
            store,
            shutdown: None,
        }
    }

    /// Stop before the next fetch once `shutdown` reads `true`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn trace(stream: &StreamSpec, phase: Phase) {
        tracing::debug!(stream = %stream, phase = ?phase, "Sync loop transition");
    }

    /// Stored watermark; read failures are logged and treated as absent.
    fn stored_watermark(&self, stream: &StreamSpec) -> Option<i64> {
        match self.store.get(&stream.key) {
            Ok(wm) => wm.map(Watermark::as_millis),
            Err(e) => {
                tracing::warn!(
                    stream = %stream,
                    error = %e,
                    "Watermark read failed, starting from the beginning"
                );
                None
            }
        }
    }

    fn advance(
        &self,
        stream: &StreamSpec,
        ms: i64,
        summary: &mut StreamSummary,
    ) -> Result<(), SyncError> {
        Self::trace(stream, Phase::Advancing);
        let watermark = Watermark::from_millis(ms);
        self.store
            .set(&stream.key, watermark)
            .map_err(|e| SyncError::State(e.to_string()))?;
        summary.watermark = Some(watermark);
        Ok(())
    }

    /// Drain `stream` until the source has nothing newer.
    ///
    /// `from_ms` overrides the stored watermark for timestamp-paginated
    /// streams; cursor-paginated streams always resume from the warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] on the first failed fetch, normalization,
    /// insert or watermark write. Pages committed before the failure stay
    /// committed and their watermarks stay advanced.
    pub async fn run(
        &self,
        stream: &StreamSpec,
        from_ms: Option<i64>,
    ) -> Result<StreamSummary, SyncError> {
        let summary = match stream.kind.origin() {
            Origin::Analytics => self.run_by_timestamp(stream, from_ms).await?,
            Origin::Chain => {
                if from_ms.is_some() {
                    tracing::warn!(stream = %stream, "Start override ignored for cursor-paginated stream");
                }
                self.run_by_cursor(stream).await?
            }
        };
        let watermark = summary.watermark.map(Watermark::to_iso);
        tracing::info!(
            stream = %stream,
            pages = summary.pages,
            fetched = summary.fetched,
            inserted = summary.inserted,
            watermark = watermark.as_deref(),
            cancelled = summary.cancelled,
            "Stream drained"
        );
        Ok(summary)
    }

    async fn run_by_timestamp(
        &self,
        stream: &StreamSpec,
        from_ms: Option<i64>,
    ) -> Result<StreamSummary, SyncError> {
        let mut summary = StreamSummary::default();
        let mut from = from_ms.or_else(|| self.stored_watermark(stream));
        let table = stream.table();

        loop {
            if self.shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            Self::trace(stream, Phase::Fetching);
            let page = self
                .source
                .fetch_page(stream, PageRequest::from_timestamp(from))
                .await?;
            summary.pages += 1;
            summary.fetched += page.scanned;

            let Some(last) = page.last_timestamp_ms() else {
                self.advance(stream, now_millis(), &mut summary)?;
                break;
            };

            Self::trace(stream, Phase::Inserting);
            let rows = normalize_page(stream, page.events)?;
            let inserted = upsert_batch(self.warehouse, table, &rows).await?;
            summary.inserted += inserted.unwrap_or(0);

            self.advance(stream, last, &mut summary)?;

            if from.unwrap_or(0) == last && inserted.is_none() {
                break;
            }
            if last >= now_millis() {
                break;
            }
            from = Some(last);
        }

        Self::trace(stream, Phase::Done);
        Ok(summary)
    }

    /// Resume point of a chain stream: the newest stored row's event id.
    async fn stored_cursor(&self, stream: &StreamSpec) -> Result<Option<EventCursor>, SyncError> {
        let filter = pool_filter(stream);
        let latest = self
            .warehouse
            .latest_values(
                stream.table(),
                &["event_id", "transaction_hash"],
                filter.as_ref(),
            )
            .await?;
        let cursor = latest.and_then(|values| match values.as_slice() {
            [SqlValue::Text(Some(event_id)), SqlValue::Text(Some(digest))] => {
                EventCursor::from_event_id(event_id, digest)
            }
            _ => None,
        });
        tracing::debug!(stream = %stream, cursor = ?cursor, "Resuming from stored cursor");
        Ok(cursor)
    }

    async fn run_by_cursor(&self, stream: &StreamSpec) -> Result<StreamSummary, SyncError> {
        let mut summary = StreamSummary::default();
        let table = stream.table();
        let mut cursor = self.stored_cursor(stream).await?;
        let mut accumulator = Accumulator::seed(self.warehouse, stream).await?;

        loop {
            if self.shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            Self::trace(stream, Phase::Fetching);
            let page = self
                .source
                .fetch_page(stream, PageRequest::from_cursor(cursor.clone()))
                .await?;
            summary.pages += 1;
            summary.fetched += page.scanned;

            if page.is_empty() {
                self.advance(stream, now_millis(), &mut summary)?;
                break;
            }

            Self::trace(stream, Phase::Inserting);
            let last = page.last_timestamp_ms();
            let next = page.next_cursor;
            let rows = normalize_page(stream, page.events)?;
            let inserted =
                upsert_batch_with(self.warehouse, table, &rows, |new_rows| {
                    accumulator.apply(new_rows);
                })
                .await?;
            summary.inserted += inserted.unwrap_or(0);

            if let Some(last) = last {
                self.advance(stream, last, &mut summary)?;
            }

            match next {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                _ => break,
            }
        }

        Self::trace(stream, Phase::Done);
        Ok(summary)
    }
}

fn pool_filter(stream: &StreamSpec) -> Option<ColumnFilter> {
    match (stream.kind.scope(), stream.pool.as_deref()) {
        (Scope::Pool, Some(pool)) => Some(ColumnFilter::new("pool", pool)),
        _ => None,
    }
}
