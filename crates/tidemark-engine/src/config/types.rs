//! Pipeline YAML configuration types.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tidemark_types::stream::{StreamKind, TokenRef};

/// Top-level pipeline file.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub version: String,
    #[serde(default)]
    pub state: StateConfig,
    pub destination: DestinationConfig,
    /// Analytics query API, required by analytics streams.
    #[serde(default)]
    pub analytics: Option<source_analytics::config::Config>,
    /// Sui fullnode, required by chain streams.
    #[serde(default)]
    pub chain: Option<source_sui::config::Config>,
    #[serde(default)]
    pub tokens: Vec<TokenRef>,
    #[serde(default)]
    pub streams: Vec<StreamKind>,
    /// Farm pool addresses; the tracked pools when omitted.
    #[serde(default)]
    pub farm_pools: Option<Vec<String>>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_parallelism() -> usize {
    1
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    #[default]
    Yaml,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,
    pub path: Option<PathBuf>,
}

impl StateConfig {
    /// Configured path, or the backend's default location.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| match self.backend {
            StateBackendKind::Yaml => PathBuf::from("./state/watermarks.yaml"),
            StateBackendKind::Sqlite => PathBuf::from("./state/watermarks.db"),
        })
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    #[serde(rename = "use")]
    pub use_ref: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl DestinationConfig {
    /// Decode the connector-specific `config` block. A missing block
    /// decodes like an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the block doesn't fit `T`.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.config {
            serde_json::Value::Null => serde_json::from_value(serde_json::json!({})),
            other => T::deserialize(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

/// Retry policy around one full stream drain.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff: BackoffKind::default(),
        }
    }
}
