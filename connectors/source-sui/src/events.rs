//! `suix_queryEvents` payloads and their conversion into raw events.

use serde::Deserialize;
use serde_json::{json, Value};

use tidemark_types::event::{AssetFlowEvent, EventCursor, PairFlowEvent, RawEvent};
use tidemark_types::stream::{StreamKind, StreamSpec};

use crate::catalog::{self, FarmPool};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventPage {
    #[serde(default)]
    pub data: Vec<SuiEvent>,
    #[serde(default)]
    pub next_cursor: Option<EventCursor>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SuiEvent {
    pub id: EventCursor,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub timestamp_ms: Option<Value>,
    #[serde(default)]
    pub parsed_json: Value,
}

impl SuiEvent {
    fn timestamp(&self) -> Option<i64> {
        match self.timestamp_ms.as_ref()? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    fn field_str(&self, name: &str) -> Option<&str> {
        self.parsed_json.get(name)?.as_str()
    }

    /// Integer base-unit amount from `parsedJson[name]`, string or number.
    fn field_amount(&self, name: &str) -> Option<u128> {
        match self.parsed_json.get(name)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        }
    }
}

/// Event filter for `stream`.
pub(crate) fn query_filter(stream: &StreamSpec) -> Option<Value> {
    match stream.kind {
        StreamKind::NaviDeposit
        | StreamKind::NaviWithdraw
        | StreamKind::MoleSavingDeposit
        | StreamKind::MoleSavingWithdraw => {
            let event_type = catalog::event_type(stream.kind)?;
            Some(json!({ "MoveEventType": event_type }))
        }
        StreamKind::MoleFarmDeposit | StreamKind::MoleFarmWithdraw => {
            let pool = catalog::farm_pool(stream.pool.as_deref()?)?;
            Some(json!({
                "MoveModule": { "package": pool.package, "module": catalog::FARM_WORKER_MODULE }
            }))
        }
        _ => None,
    }
}

fn asset_flow(event: &SuiEvent, asset: &str) -> Option<RawEvent> {
    Some(RawEvent::AssetFlow(AssetFlowEvent {
        cursor: event.id.clone(),
        timestamp_ms: event.timestamp()?,
        sender: event.sender.clone(),
        asset: asset.to_string(),
        amount: catalog::scale(event.field_amount("amount")?, asset),
    }))
}

fn pair_flow(event: &SuiEvent, pool: &FarmPool) -> Option<RawEvent> {
    Some(RawEvent::PairFlow(PairFlowEvent {
        cursor: event.id.clone(),
        pool: pool.address.to_string(),
        timestamp_ms: event.timestamp()?,
        sender: event.sender.clone(),
        asset_a: pool.coin_a.to_string(),
        asset_b: pool.coin_b.to_string(),
        amount_a: catalog::scale(event.field_amount("amount_a")?, pool.coin_a),
        amount_b: catalog::scale(event.field_amount("amount_b")?, pool.coin_b),
    }))
}

/// Logs and drops a kept event that has no usable timestamp or amount.
fn undecodable(stream: &StreamSpec, event: &SuiEvent) -> Option<RawEvent> {
    tracing::warn!(
        stream = %stream,
        tx_digest = event.id.tx_digest.as_str(),
        event_seq = event.id.event_seq.as_str(),
        event_type = event.event_type.as_str(),
        "Dropping event without a usable timestamp or amount"
    );
    None
}

/// Keep the events of `stream` and turn them into raw events, in order.
///
/// Navi streams keep only BUCK events. Farm streams keep only the
/// liquidity event matching the stream's direction for the stream's pool,
/// with both amounts present. Kept events without a usable timestamp or
/// amount are dropped with a warning.
pub(crate) fn convert(stream: &StreamSpec, events: &[SuiEvent]) -> Vec<RawEvent> {
    let farm_pool = stream.pool.as_deref().and_then(catalog::farm_pool);
    events
        .iter()
        .filter_map(|event| match stream.kind {
            StreamKind::NaviDeposit | StreamKind::NaviWithdraw => {
                if event.field_str("coin_type") != Some(catalog::NAVI_BUCK_COIN_TYPE) {
                    return None;
                }
                asset_flow(event, "BUCK").or_else(|| undecodable(stream, event))
            }
            StreamKind::MoleSavingDeposit | StreamKind::MoleSavingWithdraw => {
                asset_flow(event, "BUCK").or_else(|| undecodable(stream, event))
            }
            StreamKind::MoleFarmDeposit | StreamKind::MoleFarmWithdraw => {
                let pool = farm_pool?;
                if Some(event.event_type.as_str()) != catalog::event_type(stream.kind)
                    || event.field_str("pool") != Some(pool.address)
                {
                    return None;
                }
                pair_flow(event, pool).or_else(|| undecodable(stream, event))
            }
            _ => None,
        })
        .collect()
}
