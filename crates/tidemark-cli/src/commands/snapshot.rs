use std::path::Path;

use anyhow::Result;
use tidemark_engine::capture_pool_snapshot;
use tidemark_types::watermark::format_iso;

/// Execute the `snapshot` command: record the Navi BUCK pool balance.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    let config = super::load_pipeline(pipeline_path)?;
    let (snapshot, inserted) = capture_pool_snapshot(&config).await?;

    println!("Pool:    {}", snapshot.pool);
    println!("Balance: {} {}", snapshot.balance, snapshot.asset);
    println!("At:      {}", format_iso(snapshot.timestamp_ms));
    if !inserted {
        println!("(already stored)");
    }
    Ok(())
}
