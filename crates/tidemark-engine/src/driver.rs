//! Multi-stream driver: retry around each stream drain, streams isolated
//! from each other's failures, bounded concurrency across streams.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use tidemark_sdk::source::Source;
use tidemark_sdk::warehouse::Warehouse;
use tidemark_state::WatermarkStore;
use tidemark_types::errors::SyncError;
use tidemark_types::stream::StreamSpec;

use crate::config::types::RetryConfig;
use crate::errors::compute_backoff;
use crate::result::{RunReport, StreamReport, StreamSummary};
use crate::sync_loop::StreamSync;

/// Runs planned streams against shared connectors.
pub struct Driver {
    sources: Vec<Arc<dyn Source>>,
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn WatermarkStore>,
    retry: RetryConfig,
    parallelism: usize,
    from_ms: Option<i64>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Driver {
    pub fn new(
        sources: Vec<Arc<dyn Source>>,
        warehouse: Arc<dyn Warehouse>,
        store: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            sources,
            warehouse,
            store,
            retry: RetryConfig::default(),
            parallelism: 1,
            from_ms: None,
            shutdown: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Streams in flight at once; values below 1 mean 1.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Start timestamp-paginated streams here instead of their watermark.
    #[must_use]
    pub fn with_start(mut self, from_ms: Option<i64>) -> Self {
        self.from_ms = from_ms;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn source_for(&self, stream: &StreamSpec) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|s| s.supports(stream))
            .map(|s| s.as_ref())
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drain every stream. Never fails as a whole: each stream's outcome is
    /// in the report, in the order the streams were given.
    pub async fn run(&self, streams: Vec<StreamSpec>) -> RunReport {
        let start = Instant::now();
        tracing::info!(
            streams = streams.len(),
            parallelism = self.parallelism,
            "Starting sync run"
        );

        let mut indexed: Vec<(usize, StreamReport)> = stream::iter(streams.into_iter().enumerate())
            .map(|(i, spec)| async move { (i, self.run_stream(spec).await) })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);

        let report = RunReport {
            streams: indexed.into_iter().map(|(_, r)| r).collect(),
            duration_secs: start.elapsed().as_secs_f64(),
        };
        tracing::info!(
            streams = report.streams.len(),
            failed = report.failed().len(),
            fetched = report.total_fetched(),
            inserted = report.total_inserted(),
            retries = report.retry_count(),
            duration_secs = report.duration_secs,
            "Sync run finished"
        );
        report
    }

    async fn attempt(&self, stream: &StreamSpec) -> Result<StreamSummary, SyncError> {
        let source = self.source_for(stream).ok_or_else(|| {
            SyncError::Config(format!("no configured source can serve {stream}"))
        })?;
        let mut sync = StreamSync::new(source, self.warehouse.as_ref(), self.store.as_ref());
        if let Some(rx) = self.shutdown.clone() {
            sync = sync.with_shutdown(rx);
        }
        sync.run(stream, self.from_ms).await
    }

    /// One stream with retries around the whole drain.
    pub async fn run_stream(&self, stream: StreamSpec) -> StreamReport {
        let start = Instant::now();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            match self.attempt(&stream).await {
                Ok(summary) => break Ok(summary),
                Err(ref err)
                    if err.is_retryable()
                        && attempt < max_attempts
                        && !self.shutdown_requested() =>
                {
                    let delay = compute_backoff(&self.retry, attempt);
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(
                        stream = %stream,
                        attempt,
                        max_attempts,
                        delay_ms,
                        error = %err,
                        "Retryable error, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(
                            stream = %stream,
                            attempt,
                            max_attempts,
                            error = %err,
                            payload = err.payload(),
                            "Max attempts exhausted, stream failed"
                        );
                    } else {
                        tracing::error!(
                            stream = %stream,
                            error = %err,
                            payload = err.payload(),
                            "Non-retryable error, stream failed"
                        );
                    }
                    break Err(err);
                }
            }
        };

        let (summary, error) = match outcome {
            Ok(summary) => (summary, None),
            Err(err) => (StreamSummary::default(), Some(err.to_string())),
        };
        StreamReport {
            stream: stream.key.clone(),
            kind: stream.kind,
            attempts: attempt,
            summary,
            error,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }
}
