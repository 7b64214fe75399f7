use std::path::PathBuf;

use serde::Deserialize;

/// `SQLite` warehouse config from pipeline YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database file. Omitted or `":memory:"` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path
            .as_deref()
            .map_or(true, |p| p.as_os_str() == ":memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_means_memory() {
        assert!(Config::default().is_in_memory());
        assert!(Config {
            path: Some(PathBuf::from(":memory:"))
        }
        .is_in_memory());
        assert!(!Config {
            path: Some(PathBuf::from("warehouse.db"))
        }
        .is_in_memory());
    }
}
