//! Expansion of configured stream kinds into planned streams.

use std::collections::HashSet;

use anyhow::{bail, Result};
use source_sui::catalog::FARM_POOLS;
use tidemark_types::stream::{Scope, StreamKind, StreamSpec};

use crate::config::types::PipelineConfig;

/// Plan every stream the config asks for, in config order.
///
/// Token-scoped kinds get one stream per token, pool-scoped kinds one per
/// farm pool. A stream key planned twice is kept once.
///
/// # Errors
///
/// Fails if a liquidation stream is planned for a token without a coin
/// type.
pub fn plan_streams(config: &PipelineConfig) -> Result<Vec<StreamSpec>> {
    let pools: Vec<String> = match config.farm_pools.as_ref() {
        Some(pools) => pools.clone(),
        None => FARM_POOLS.iter().map(|p| p.address.to_string()).collect(),
    };

    let mut seen = HashSet::new();
    let mut planned = Vec::new();
    for &kind in &config.streams {
        let specs: Vec<StreamSpec> = match kind.scope() {
            Scope::Token => {
                let mut specs = Vec::with_capacity(config.tokens.len());
                for token in &config.tokens {
                    if kind == StreamKind::BottleLiquidated && token.coin_type.is_none() {
                        bail!(
                            "Token '{}' has no coin_type, required by {kind}",
                            token.symbol
                        );
                    }
                    specs.push(StreamSpec::for_token(kind, token.clone()));
                }
                specs
            }
            Scope::Protocol => vec![StreamSpec::protocol(kind)],
            Scope::Pool => pools
                .iter()
                .map(|pool| StreamSpec::for_pool(kind, pool.clone()))
                .collect(),
        };
        for spec in specs {
            if seen.insert(spec.key.clone()) {
                planned.push(spec);
            } else {
                tracing::debug!(stream = %spec, "Stream planned twice, keeping the first");
            }
        }
    }
    Ok(planned)
}

/// Keep only the streams named in `names`, matched against the stream
/// name (`SUI_Bottle_Created`) or its kind (`bottle_created`). An empty
/// list keeps everything.
///
/// # Errors
///
/// Fails if a name matches no planned stream.
pub fn select_streams(planned: Vec<StreamSpec>, names: &[String]) -> Result<Vec<StreamSpec>> {
    if names.is_empty() {
        return Ok(planned);
    }
    let matches = |spec: &StreamSpec, name: &str| {
        spec.key.name() == name || spec.kind.as_str() == name
    };
    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| !planned.iter().any(|spec| matches(spec, name)))
        .collect();
    if !unknown.is_empty() {
        bail!("No planned stream matches: {}", unknown.join(", "));
    }
    Ok(planned
        .into_iter()
        .filter(|spec| names.iter().any(|name| matches(spec, name)))
        .collect())
}
