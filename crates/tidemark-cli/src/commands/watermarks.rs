use std::path::Path;

use anyhow::{anyhow, Result};
use tidemark_engine::open_state;
use tidemark_state::WatermarkStore;
use tidemark_types::stream::StreamKey;

/// Execute the `watermarks` command: list stored watermarks, or clear the
/// named ones so their streams start over on the next sync.
pub fn execute(pipeline_path: &Path, reset: &[String]) -> Result<()> {
    let config = super::load_pipeline(pipeline_path)?;
    let store = open_state(&config.state)?;
    let entries = store.list().map_err(|e| anyhow!("Failed to read watermarks: {e}"))?;

    if reset.is_empty() {
        if entries.is_empty() {
            println!("No watermarks stored.");
        }
        for (key, watermark) in &entries {
            println!("{:40} {}", key.to_string(), watermark.to_iso());
        }
        return Ok(());
    }

    let mut unknown = Vec::new();
    for name in reset {
        let matched: Vec<&StreamKey> = entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| matches(key, name))
            .collect();
        if matched.is_empty() {
            unknown.push(name.as_str());
        }
        for key in matched {
            store
                .clear(key)
                .map_err(|e| anyhow!("Failed to reset {key}: {e}"))?;
            tracing::info!(stream = %key, "Watermark reset");
            println!("Reset {key}");
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("No stored watermark for: {}", unknown.join(", "))
    }
}

/// `name` is either the bare stream name or `protocol/name`.
fn matches(key: &StreamKey, name: &str) -> bool {
    key.name() == name || key.to_string() == name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_matches_bare_and_qualified_names() {
        let key = StreamKey::new("Bucket", "SUI_Bottle_Created");
        assert!(matches(&key, "SUI_Bottle_Created"));
        assert!(matches(&key, "Bucket/SUI_Bottle_Created"));
        assert!(!matches(&key, "Navi/SUI_Bottle_Created"));
        assert!(!matches(&key, "Bottle_Created"));
    }
}
