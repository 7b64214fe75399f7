use std::time::Duration;

use serde::Deserialize;

/// Sui JSON-RPC config from pipeline YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Events requested per `suix_queryEvents` call.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Extra attempts after a failed call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "https://fullnode.mainnet.sui.io:443".to_string()
}

fn default_page_limit() -> usize {
    50
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            page_limit: default_page_limit(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// # Errors
    ///
    /// Returns every problem found, joined into one message.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            errors.push(format!("rpc_url must be http(s), got '{}'", self.rpc_url));
        }
        // Fullnodes cap queryEvents pages at 50.
        if self.page_limit == 0 || self.page_limit > 50 {
            errors.push(format!("page_limit must be in 1..=50, got {}", self.page_limit));
        }
        if self.max_retries == 0 {
            errors.push("max_retries must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mainnet_fullnode() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.rpc_url, "https://fullnode.mainnet.sui.io:443");
        assert_eq!(config.page_limit, 50);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_collects_problems() {
        let config = Config {
            rpc_url: "ws://node".into(),
            page_limit: 0,
            max_retries: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("rpc_url"));
        assert!(err.contains("page_limit"));
        assert!(err.contains("max_retries"));
    }
}
