use serde::Deserialize;

/// Largest page the query API will return.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Analytics query API config from pipeline YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Full URL of the SQL execute endpoint.
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// # Errors
    ///
    /// Returns every problem found, joined into one message.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            errors.push(format!("url must be http(s), got '{}'", self.url));
        }
        if self.api_key.trim().is_empty() {
            errors.push("api_key must not be empty".to_string());
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            errors.push(format!(
                "page_size must be in 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}
