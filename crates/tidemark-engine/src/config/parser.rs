//! Pipeline YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::PipelineConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a pipeline YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_pipeline_str(yaml_str: &str) -> Result<PipelineConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: PipelineConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse pipeline YAML")?;
    Ok(config)
}

/// Parse a pipeline YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_pipeline(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    parse_pipeline_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::stream::StreamKind;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TM_TEST_API_KEY", "k-123");
        let input = "api_key: ${TM_TEST_API_KEY}\npage_size: 100";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("k-123"));
        assert!(!result.contains("${TM_TEST_API_KEY}"));
        std::env::remove_var("TM_TEST_API_KEY");
    }

    #[test]
    fn test_repeated_env_var_substituted_everywhere() {
        std::env::set_var("TM_TEST_REPEAT", "x");
        let result = substitute_env_vars("${TM_TEST_REPEAT}-${TM_TEST_REPEAT}").unwrap();
        assert_eq!(result, "x-x");
        std::env::remove_var("TM_TEST_REPEAT");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "rpc_url: https://fullnode.mainnet.sui.io:443";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let input = "${TM_MISSING_X} and ${TM_MISSING_Y} and ${TM_MISSING_X}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert_eq!(
            err_msg,
            "Missing environment variable(s): TM_MISSING_X, TM_MISSING_Y"
        );
    }

    #[test]
    fn test_parse_pipeline_from_string() {
        std::env::set_var("TM_TEST_ANALYTICS_KEY", "secret");
        let yaml = r#"
version: "1.0"
destination:
  use: dest-sqlite
  config: {}
analytics:
  url: https://analytics.example.com/sql
  api_key: ${TM_TEST_ANALYTICS_KEY}
tokens:
  - symbol: SUI
streams: [bottle_created, fee_total]
"#;
        let config = parse_pipeline_str(yaml).unwrap();
        assert_eq!(config.analytics.as_ref().unwrap().api_key, "secret");
        assert_eq!(
            config.streams,
            vec![StreamKind::BottleCreated, StreamKind::FeeTotal]
        );
        std::env::remove_var("TM_TEST_ANALYTICS_KEY");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        let result = parse_pipeline_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_pipeline_file_not_found() {
        let result = parse_pipeline(Path::new("/nonexistent/pipeline.yaml"));
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read pipeline file"));
    }
}
