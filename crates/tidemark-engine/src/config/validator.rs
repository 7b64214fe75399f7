//! Semantic validation for parsed pipeline configuration values.

use std::collections::HashSet;

use anyhow::{bail, Result};
use tidemark_types::stream::{Origin, Scope, StreamKind};

use crate::config::types::PipelineConfig;

/// Destination connectors this build knows how to open.
pub const DESTINATIONS: [&str; 2] = [dest_postgres::CONNECTOR_NAME, dest_sqlite::CONNECTOR_NAME];

fn validate_destination(config: &PipelineConfig, errors: &mut Vec<String>) {
    let destination = &config.destination;
    match destination.use_ref.as_str() {
        dest_postgres::CONNECTOR_NAME => {
            match destination.settings::<dest_postgres::config::Config>() {
                Ok(pg) => {
                    if let Err(e) = pg.validate() {
                        errors.push(format!("destination: {e}"));
                    }
                }
                Err(e) => errors.push(format!("destination: invalid dest-postgres config: {e}")),
            }
        }
        dest_sqlite::CONNECTOR_NAME => {
            if let Err(e) = destination.settings::<dest_sqlite::config::Config>() {
                errors.push(format!("destination: invalid dest-sqlite config: {e}"));
            }
        }
        other => errors.push(format!(
            "Unknown destination connector '{other}', expected one of: {}",
            DESTINATIONS.join(", ")
        )),
    }
}

fn validate_tokens(config: &PipelineConfig, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for (i, token) in config.tokens.iter().enumerate() {
        if token.symbol.trim().is_empty() {
            errors.push(format!("Token {i} has an empty symbol"));
        } else if !seen.insert(token.symbol.as_str()) {
            errors.push(format!("Token '{}' is listed more than once", token.symbol));
        }
    }

    if config.streams.contains(&StreamKind::BottleLiquidated) {
        for token in config.tokens.iter().filter(|t| t.coin_type.is_none()) {
            errors.push(format!(
                "Token '{}' has no coin_type, required by bottle_liquidated",
                token.symbol
            ));
        }
    }
}

/// Validate a parsed pipeline configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the pipeline config.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.streams.is_empty() {
        errors.push("Pipeline must define at least one stream".to_string());
    }

    let needs = |origin: Origin| config.streams.iter().any(|k| k.origin() == origin);

    if config.streams.iter().any(|k| k.scope() == Scope::Token) && config.tokens.is_empty() {
        errors.push("Token-scoped streams require at least one entry in tokens".to_string());
    }

    if needs(Origin::Analytics) {
        match config.analytics.as_ref() {
            None => errors.push("Analytics streams require an analytics section".to_string()),
            Some(analytics) => {
                if let Err(e) = analytics.validate() {
                    errors.push(format!("analytics: {e}"));
                }
            }
        }
    }

    if needs(Origin::Chain) {
        match config.chain.as_ref() {
            None => errors.push("Chain streams require a chain section".to_string()),
            Some(chain) => {
                if let Err(e) = chain.validate() {
                    errors.push(format!("chain: {e}"));
                }
            }
        }
    }

    if let Some(pools) = config.farm_pools.as_ref() {
        for pool in pools {
            if source_sui::catalog::farm_pool(pool).is_none() {
                errors.push(format!("Unknown farm pool '{pool}'"));
            }
        }
    }

    validate_tokens(config, &mut errors);
    validate_destination(config, &mut errors);

    if config.retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be at least 1".to_string());
    }

    if config.parallelism == 0 {
        errors.push("parallelism must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_pipeline_str;

    fn base_yaml(streams: &str) -> String {
        format!(
            r#"
version: "1.0"
destination:
  use: dest-sqlite
  config: {{}}
analytics:
  url: https://analytics.example.com/sql
  api_key: key
chain:
  max_retries: 3
tokens:
  - symbol: SUI
    coin_type: "0x2::sui::SUI"
streams: {streams}
"#
        )
    }

    fn errors_of(yaml: &str) -> String {
        let config = parse_pipeline_str(yaml).unwrap();
        validate_pipeline(&config).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_pipeline_passes() {
        let config = parse_pipeline_str(&base_yaml(
            "[bottle_created, bottle_liquidated, fee_total, navi_deposit, mole_farm_deposit]",
        ))
        .unwrap();
        validate_pipeline(&config).unwrap();
    }

    #[test]
    fn test_bad_version() {
        let yaml = base_yaml("[fee_total]").replace("\"1.0\"", "\"2.0\"");
        assert!(errors_of(&yaml).contains("Unsupported pipeline version '2.0'"));
    }

    #[test]
    fn test_no_streams() {
        assert!(errors_of(&base_yaml("[]")).contains("at least one stream"));
    }

    #[test]
    fn test_token_streams_need_tokens() {
        let yaml = base_yaml("[bottle_updated]").replace(
            "tokens:\n  - symbol: SUI\n    coin_type: \"0x2::sui::SUI\"\n",
            "",
        );
        assert!(errors_of(&yaml).contains("require at least one entry in tokens"));
    }

    #[test]
    fn test_missing_sections_reported_together() {
        let yaml = r#"
version: "1.0"
destination: { use: dest-sqlite }
streams: [fee_total, navi_withdraw]
parallelism: 0
retry: { max_attempts: 0 }
"#;
        let msg = errors_of(yaml);
        assert!(msg.starts_with("Pipeline validation failed:"));
        assert!(msg.contains("Analytics streams require an analytics section"));
        assert!(msg.contains("Chain streams require a chain section"));
        assert!(msg.contains("retry.max_attempts must be at least 1"));
        assert!(msg.contains("parallelism must be at least 1"));
    }

    #[test]
    fn test_page_size_bounds() {
        let yaml = base_yaml("[fee_total]").replace("api_key: key", "api_key: key\n  page_size: 20000");
        assert!(errors_of(&yaml).contains("page_size"));
    }

    #[test]
    fn test_chain_retries_must_be_positive() {
        let yaml = base_yaml("[navi_deposit]").replace("max_retries: 3", "max_retries: 0");
        assert!(errors_of(&yaml).contains("chain:"));
    }

    #[test]
    fn test_liquidation_needs_coin_type() {
        let yaml = base_yaml("[bottle_liquidated]").replace("    coin_type: \"0x2::sui::SUI\"\n", "");
        assert!(errors_of(&yaml).contains("Token 'SUI' has no coin_type"));
    }

    #[test]
    fn test_unknown_farm_pool() {
        let yaml = format!("{}farm_pools: [\"0xfeed\"]\n", base_yaml("[mole_farm_deposit]"));
        assert!(errors_of(&yaml).contains("Unknown farm pool '0xfeed'"));
    }

    #[test]
    fn test_unknown_destination() {
        let yaml = base_yaml("[fee_total]").replace("use: dest-sqlite", "use: dest-snowflake");
        assert!(errors_of(&yaml).contains("Unknown destination connector 'dest-snowflake'"));
    }

    #[test]
    fn test_postgres_destination_config_checked() {
        let yaml = base_yaml("[fee_total]").replace(
            "use: dest-sqlite\n  config: {}",
            "use: dest-postgres\n  config:\n    host: ''\n    user: etl\n    database: wh",
        );
        assert!(errors_of(&yaml).contains("host must not be empty"));
    }
}
