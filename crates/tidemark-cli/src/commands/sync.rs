use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::watch;

use tidemark_engine::{run_pipeline, RunOptions, RunReport};
use tidemark_types::watermark::{format_iso, parse_timestamp};

/// Execute the `sync` command: parse, validate, and drain every stream.
pub async fn execute(pipeline_path: &Path, from: Option<&str>, streams: Vec<String>) -> Result<()> {
    let config = super::load_pipeline(pipeline_path)?;
    let from_ms = from
        .map(parse_timestamp)
        .transpose()
        .context("Invalid --from timestamp")?;

    let from_iso = from_ms.map(format_iso);
    tracing::info!(
        destination = config.destination.use_ref.as_str(),
        streams = config.streams.len(),
        from = from_iso.as_deref(),
        "Pipeline validated"
    );

    // Ctrl-C stops new fetches; in-flight batches finish or roll back.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Shutdown requested, finishing in-flight pages");
            let _ = shutdown_tx.send(true);
        }
    });

    let options = RunOptions {
        from_ms,
        streams,
        shutdown: Some(shutdown_rx),
    };
    let report = run_pipeline(&config, &options).await?;
    print_report(&report);

    let failed = report.failed().len();
    if failed == 0 {
        Ok(())
    } else {
        anyhow::bail!("{failed} of {} stream(s) failed", report.streams.len())
    }
}

fn print_report(report: &RunReport) {
    for stream in &report.streams {
        let status = match (&stream.error, stream.summary.cancelled) {
            (Some(_), _) => "FAILED",
            (None, true) => "STOPPED",
            (None, false) => "OK",
        };
        let watermark = stream
            .summary
            .watermark
            .map_or_else(|| "-".to_string(), |wm| wm.to_iso());
        println!(
            "{:40} {:8} inserted={:<8} watermark={}",
            stream.stream.to_string(),
            status,
            stream.summary.inserted,
            watermark
        );
        if let Some(error) = &stream.error {
            println!("  {error}");
        }
    }
    println!("Sync finished.");
    println!("  Streams:         {}", report.streams.len());
    println!("  Records fetched: {}", report.total_fetched());
    println!("  Records written: {}", report.total_inserted());
    println!("  Duration:        {:.2}s", report.duration_secs);
    if report.retry_count() > 0 {
        println!("  Retries:         {}", report.retry_count());
    }
}
