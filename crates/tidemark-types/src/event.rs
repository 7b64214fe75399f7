//! Raw source events.
//!
//! Analytics rows are deserialized straight from the query API's JSON
//! objects. Unknown columns are ignored and numeric columns may arrive as
//! numbers, numeric strings or null. Chain events are produced by the chain
//! adapter after decimal adjustment and post-filtering.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::watermark::parse_timestamp;

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got '{s}'"))),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Ok(Some(other.to_string())),
    }
}

fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer)?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| de::Error::custom("missing event id"))
}

fn source_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp {n}"))),
        Value::String(s) => parse_timestamp(&s).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("invalid timestamp {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Analytics rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleCreatedRecord {
    #[serde(deserialize_with = "required_id")]
    pub distinct_event_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bottle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buck_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: Option<String>,
    #[serde(deserialize_with = "source_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleUpdatedRecord {
    #[serde(deserialize_with = "required_id")]
    pub distinct_event_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bottle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buck_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: Option<String>,
    #[serde(deserialize_with = "source_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buck_change_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buck_change_amount_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_change_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_change_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleDestroyedRecord {
    #[serde(deserialize_with = "required_id")]
    pub distinct_event_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bottle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub collateral_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: Option<String>,
    #[serde(deserialize_with = "source_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationRecord {
    #[serde(deserialize_with = "required_id")]
    pub distinct_event_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub liquidator_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pool_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub profit_usd: Option<f64>,
    #[serde(deserialize_with = "source_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeValueRecord {
    #[serde(deserialize_with = "required_id")]
    pub distinct_event_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(deserialize_with = "source_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
    /// Service the fee was charged by (`from` in the source schema).
    #[serde(default, rename = "from", deserialize_with = "lenient_string")]
    pub service: Option<String>,
}

// ---------------------------------------------------------------------------
// Chain events
// ---------------------------------------------------------------------------

/// Pagination position of a chain event query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCursor {
    pub tx_digest: String,
    pub event_seq: String,
}

impl EventCursor {
    /// Event id as stored in the warehouse: digest immediately followed by
    /// the sequence number.
    #[must_use]
    pub fn event_id(&self) -> String {
        format!("{}{}", self.tx_digest, self.event_seq)
    }

    /// Rebuild a cursor from a stored `event_id` and its `transaction_hash`.
    #[must_use]
    pub fn from_event_id(event_id: &str, tx_digest: &str) -> Option<Self> {
        let seq = event_id.strip_prefix(tx_digest)?;
        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            tx_digest: tx_digest.to_string(),
            event_seq: seq.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFlowEvent {
    pub cursor: EventCursor,
    pub timestamp_ms: i64,
    pub sender: String,
    pub asset: String,
    /// Amount already scaled by the asset's decimals.
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFlowEvent {
    pub cursor: EventCursor,
    pub pool: String,
    pub timestamp_ms: i64,
    pub sender: String,
    pub asset_a: String,
    pub asset_b: String,
    pub amount_a: f64,
    pub amount_b: f64,
}

// ---------------------------------------------------------------------------
// RawEvent
// ---------------------------------------------------------------------------

/// One record as delivered by a source, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RawEvent {
    BottleCreated(BottleCreatedRecord),
    BottleUpdated(BottleUpdatedRecord),
    BottleDestroyed(BottleDestroyedRecord),
    Liquidation(LiquidationRecord),
    FeeValue(FeeValueRecord),
    AssetFlow(AssetFlowEvent),
    PairFlow(PairFlowEvent),
}

impl RawEvent {
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::BottleCreated(r) => r.timestamp,
            Self::BottleUpdated(r) => r.timestamp,
            Self::BottleDestroyed(r) => r.timestamp,
            Self::Liquidation(r) => r.timestamp,
            Self::FeeValue(r) => r.timestamp,
            Self::AssetFlow(e) => e.timestamp_ms,
            Self::PairFlow(e) => e.timestamp_ms,
        }
    }

    /// Short shape name for logs and error messages.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::BottleCreated(_) => "bottle_created",
            Self::BottleUpdated(_) => "bottle_updated",
            Self::BottleDestroyed(_) => "bottle_destroyed",
            Self::Liquidation(_) => "liquidation",
            Self::FeeValue(_) => "fee_value",
            Self::AssetFlow(_) => "asset_flow",
            Self::PairFlow(_) => "pair_flow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_record_tolerates_missing_and_stringly_numbers() {
        let record: BottleCreatedRecord = serde_json::from_value(json!({
            "distinct_event_id": "abc123",
            "bottle_id": "0xbottle",
            "buck_amount": "12.5",
            "collateral_amount": null,
            "timestamp": "2024-05-31 16:08:37.123",
            "some_unrelated_column": 7
        }))
        .unwrap();
        assert_eq!(record.distinct_event_id, "abc123");
        assert_eq!(record.buck_amount, Some(12.5));
        assert_eq!(record.collateral_amount, None);
        assert_eq!(record.coin, None);
        assert_eq!(record.timestamp, 1_717_171_717_123);
    }

    #[test]
    fn numeric_event_id_becomes_string() {
        let record: FeeValueRecord = serde_json::from_value(json!({
            "distinct_event_id": 991,
            "value": 0.25,
            "from": "borrow",
            "timestamp": 1_717_171_717_123_i64
        }))
        .unwrap();
        assert_eq!(record.distinct_event_id, "991");
        assert_eq!(record.service.as_deref(), Some("borrow"));
    }

    #[test]
    fn missing_event_id_is_rejected() {
        let result = serde_json::from_value::<BottleDestroyedRecord>(json!({
            "timestamp": "2024-05-31T00:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn non_numeric_amount_is_rejected() {
        let result = serde_json::from_value::<LiquidationRecord>(json!({
            "distinct_event_id": "x",
            "amount": "lots",
            "timestamp": "2024-05-31T00:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn cursor_rebuilds_from_event_id() {
        let cursor = EventCursor::from_event_id("8nQm3xDigest12", "8nQm3xDigest").unwrap();
        assert_eq!(cursor.event_seq, "12");
        assert_eq!(cursor.event_id(), "8nQm3xDigest12");
        assert!(EventCursor::from_event_id("other1", "8nQm3xDigest").is_none());
        assert!(EventCursor::from_event_id("8nQm3xDigest", "8nQm3xDigest").is_none());
    }

    #[test]
    fn cursor_uses_rpc_field_names() {
        let cursor = EventCursor {
            tx_digest: "d".into(),
            event_seq: "0".into(),
        };
        assert_eq!(
            serde_json::to_value(&cursor).unwrap(),
            json!({"txDigest": "d", "eventSeq": "0"})
        );
    }
}
