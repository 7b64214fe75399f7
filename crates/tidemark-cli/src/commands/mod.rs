pub mod check;
pub mod serve;
pub mod snapshot;
pub mod sync;
pub mod watermarks;

use std::path::Path;

use anyhow::{Context, Result};
use tidemark_engine::config::types::PipelineConfig;
use tidemark_engine::config::{parser, validator};

/// Parse and validate a pipeline file.
pub(crate) fn load_pipeline(pipeline_path: &Path) -> Result<PipelineConfig> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    validator::validate_pipeline(&config)?;
    Ok(config)
}
