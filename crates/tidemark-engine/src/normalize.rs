//! Raw source events to canonical warehouse rows.
//!
//! Pure field projection: no I/O, no defaults beyond NULL for absent
//! numerics. Chain rows leave their running totals at zero for the
//! accumulator to fill in.

use tidemark_types::errors::NormalizeError;
use tidemark_types::event::{AssetFlowEvent, PairFlowEvent, RawEvent};
use tidemark_types::row::{
    AssetFlow, BottleCreate, BottleDestroy, BottleUpdate, CanonicalRow, FeeTotal, Liquidation,
    PairFlow,
};
use tidemark_types::stream::{StreamKind, StreamSpec};

/// Row key for a source event id: `"{token}-{id}"` for token-scoped
/// streams, the bare id otherwise.
#[must_use]
pub fn row_key(stream: &StreamSpec, event_id: &str) -> String {
    match stream.key_prefix() {
        Some(symbol) => format!("{symbol}-{event_id}"),
        None => event_id.to_string(),
    }
}

/// Analytics bottle and liquidation rows carry no coin column; the coin is
/// the token the stream is scoped to.
fn token_coin(stream: &StreamSpec, reported: Option<String>) -> Option<String> {
    stream.key_prefix().map(str::to_string).or(reported)
}

fn asset_flow(event: AssetFlowEvent) -> AssetFlow {
    AssetFlow {
        event_id: event.cursor.event_id(),
        timestamp_ms: event.timestamp_ms,
        sender: event.sender,
        transaction_hash: event.cursor.tx_digest,
        asset: event.asset,
        asset_change: event.amount,
        accumulation: 0.0,
    }
}

fn pair_flow(event: PairFlowEvent) -> PairFlow {
    PairFlow {
        event_id: event.cursor.event_id(),
        pool: event.pool,
        timestamp_ms: event.timestamp_ms,
        sender: event.sender,
        transaction_hash: event.cursor.tx_digest,
        accumulation_a: 0.0,
        accumulation_b: 0.0,
        asset_a: event.asset_a,
        asset_b: event.asset_b,
        asset_change_a: event.amount_a,
        asset_change_b: event.amount_b,
    }
}

/// Project one raw event onto the canonical row of `stream`'s table.
///
/// # Errors
///
/// Returns [`NormalizeError`] when the event's shape does not belong to the
/// stream's kind.
pub fn normalize(stream: &StreamSpec, event: RawEvent) -> Result<CanonicalRow, NormalizeError> {
    let row = match (stream.kind, event) {
        (StreamKind::BottleCreated, RawEvent::BottleCreated(r)) => {
            CanonicalRow::BottleCreate(BottleCreate {
                id: row_key(stream, &r.distinct_event_id),
                bottle_id: r.bottle_id,
                buck_amount: r.buck_amount,
                coin: token_coin(stream, r.coin),
                collateral_amount: r.collateral_amount,
                sender: r.sender,
                timestamp_ms: r.timestamp,
                transaction_hash: r.transaction_hash,
            })
        }
        (StreamKind::BottleUpdated, RawEvent::BottleUpdated(r)) => {
            CanonicalRow::BottleUpdate(BottleUpdate {
                id: row_key(stream, &r.distinct_event_id),
                bottle_id: r.bottle_id,
                buck_amount: r.buck_amount,
                coin: token_coin(stream, r.coin),
                collateral_amount: r.collateral_amount,
                sender: r.sender,
                timestamp_ms: r.timestamp,
                transaction_hash: r.transaction_hash,
                buck_change_amount: r.buck_change_amount,
                buck_change_amount_usd: r.buck_change_amount_usd,
                collateral_change_amount: r.collateral_change_amount,
                collateral_change_usd: r.collateral_change_usd,
            })
        }
        (StreamKind::BottleDestroyed, RawEvent::BottleDestroyed(r)) => {
            CanonicalRow::BottleDestroy(BottleDestroy {
                id: row_key(stream, &r.distinct_event_id),
                bottle_id: r.bottle_id,
                coin: token_coin(stream, r.coin),
                collateral_amount: r.collateral_amount,
                sender: r.sender,
                timestamp_ms: r.timestamp,
                transaction_hash: r.transaction_hash,
            })
        }
        (StreamKind::BottleLiquidated, RawEvent::Liquidation(r)) => {
            CanonicalRow::Liquidation(Liquidation {
                id: row_key(stream, &r.distinct_event_id),
                bottle_id: r.user_address,
                coin: token_coin(stream, r.coin),
                collateral_amount: r.amount,
                collateral_amount_usd: r.amount_usd,
                liquidator_address: r.liquidator_address,
                pool_address: r.pool_address,
                profit_usd: r.profit_usd,
                timestamp_ms: r.timestamp,
                transaction_hash: r.transaction_hash,
            })
        }
        (StreamKind::FeeTotal, RawEvent::FeeValue(r)) => CanonicalRow::FeeTotal(FeeTotal {
            id: row_key(stream, &r.distinct_event_id),
            coin: r.coin_symbol,
            fee_value: r.value,
            timestamp_ms: r.timestamp,
            transaction_hash: r.transaction_hash,
            service: r.service,
        }),
        (
            StreamKind::NaviDeposit
            | StreamKind::NaviWithdraw
            | StreamKind::MoleSavingDeposit
            | StreamKind::MoleSavingWithdraw,
            RawEvent::AssetFlow(e),
        ) => CanonicalRow::AssetFlow(asset_flow(e)),
        (StreamKind::MoleFarmDeposit | StreamKind::MoleFarmWithdraw, RawEvent::PairFlow(e)) => {
            CanonicalRow::PairFlow(pair_flow(e))
        }
        (kind, other) => {
            return Err(NormalizeError {
                kind,
                shape: other.shape(),
            })
        }
    };
    Ok(row)
}

/// Normalize a whole page, failing on the first mismatched event.
///
/// # Errors
///
/// Returns the first [`NormalizeError`] encountered.
pub fn normalize_page(
    stream: &StreamSpec,
    events: Vec<RawEvent>,
) -> Result<Vec<CanonicalRow>, NormalizeError> {
    events.into_iter().map(|e| normalize(stream, e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::event::{
        BottleCreatedRecord, BottleUpdatedRecord, EventCursor, FeeValueRecord, LiquidationRecord,
    };
    use tidemark_types::stream::TokenRef;

    fn sui_stream(kind: StreamKind) -> StreamSpec {
        StreamSpec::for_token(
            kind,
            TokenRef {
                symbol: "SUI".into(),
                coin_type: Some("0x2::sui::SUI".into()),
            },
        )
    }

    fn created(id: &str) -> RawEvent {
        RawEvent::BottleCreated(BottleCreatedRecord {
            distinct_event_id: id.into(),
            bottle_id: Some("0xbottle".into()),
            buck_amount: Some(100.0),
            coin: None,
            collateral_amount: None,
            sender: Some("0xsender".into()),
            timestamp: 1_717_171_717_123,
            transaction_hash: Some("tx".into()),
        })
    }

    #[test]
    fn token_rows_are_prefixed_with_symbol() {
        let row = normalize(&sui_stream(StreamKind::BottleCreated), created("abc123")).unwrap();
        assert_eq!(row.key(), "SUI-abc123");
        match row {
            CanonicalRow::BottleCreate(r) => {
                assert_eq!(r.buck_amount, Some(100.0));
                assert_eq!(r.collateral_amount, None);
                assert_eq!(r.timestamp_ms, 1_717_171_717_123);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn liquidation_renames_fields() {
        let event = RawEvent::Liquidation(LiquidationRecord {
            distinct_event_id: "liq1".into(),
            user_address: Some("0xuser".into()),
            coin: None,
            amount: Some(12.5),
            amount_usd: Some(20.0),
            liquidator_address: Some("0xliq".into()),
            pool_address: Some("0xpool".into()),
            profit_usd: Some(1.5),
            timestamp: 10,
            transaction_hash: None,
        });
        let row = normalize(&sui_stream(StreamKind::BottleLiquidated), event).unwrap();
        match row {
            CanonicalRow::Liquidation(r) => {
                assert_eq!(r.id, "SUI-liq1");
                assert_eq!(r.bottle_id.as_deref(), Some("0xuser"));
                assert_eq!(r.coin.as_deref(), Some("SUI"));
                assert_eq!(r.collateral_amount, Some(12.5));
                assert_eq!(r.collateral_amount_usd, Some(20.0));
                assert_eq!(r.profit_usd, Some(1.5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bottle_rows_take_coin_from_stream_token() {
        let record: BottleCreatedRecord = serde_json::from_value(serde_json::json!({
            "distinct_event_id": "abc123",
            "bottle_id": "0xb",
            "buck_amount": 100,
            "collateral_amount": 50,
            "sender": "0xs",
            "timestamp": "2024-05-31T16:08:37.123Z",
            "transaction_hash": "tx",
            "chain": "sui_mainnet"
        }))
        .unwrap();
        assert_eq!(record.coin, None);

        let row = normalize(
            &sui_stream(StreamKind::BottleCreated),
            RawEvent::BottleCreated(record),
        )
        .unwrap();
        match row {
            CanonicalRow::BottleCreate(r) => assert_eq!(r.coin.as_deref(), Some("SUI")),
            other => panic!("unexpected {other:?}"),
        }

        let updated: BottleUpdatedRecord = serde_json::from_value(serde_json::json!({
            "distinct_event_id": "u1",
            "timestamp": "2024-05-31T16:08:37.123Z"
        }))
        .unwrap();
        let row = normalize(
            &sui_stream(StreamKind::BottleUpdated),
            RawEvent::BottleUpdated(updated),
        )
        .unwrap();
        match row {
            CanonicalRow::BottleUpdate(r) => assert_eq!(r.coin.as_deref(), Some("SUI")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fee_rows_keep_bare_id() {
        let event = RawEvent::FeeValue(FeeValueRecord {
            distinct_event_id: "fee9".into(),
            coin_symbol: Some("BUCK".into()),
            value: Some(0.25),
            timestamp: 5,
            transaction_hash: Some("tx".into()),
            service: Some("borrow".into()),
        });
        let row = normalize(&StreamSpec::protocol(StreamKind::FeeTotal), event).unwrap();
        match row {
            CanonicalRow::FeeTotal(r) => {
                assert_eq!(r.id, "fee9");
                assert_eq!(r.coin.as_deref(), Some("BUCK"));
                assert_eq!(r.fee_value, Some(0.25));
                assert_eq!(r.service.as_deref(), Some("borrow"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn chain_rows_use_digest_and_sequence() {
        let event = RawEvent::AssetFlow(AssetFlowEvent {
            cursor: EventCursor {
                tx_digest: "8nQm".into(),
                event_seq: "3".into(),
            },
            timestamp_ms: 42,
            sender: "0xs".into(),
            asset: "BUCK".into(),
            amount: 7.5,
        });
        let row = normalize(&StreamSpec::protocol(StreamKind::NaviDeposit), event).unwrap();
        match row {
            CanonicalRow::AssetFlow(r) => {
                assert_eq!(r.event_id, "8nQm3");
                assert_eq!(r.transaction_hash, "8nQm");
                assert_eq!(r.asset_change, 7.5);
                assert_eq!(r.accumulation, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let err = normalize(&StreamSpec::protocol(StreamKind::FeeTotal), created("x")).unwrap_err();
        assert_eq!(err.kind, StreamKind::FeeTotal);
        assert_eq!(err.shape, "bottle_created");
    }

    #[test]
    fn page_stops_at_first_mismatch() {
        let stream = sui_stream(StreamKind::BottleCreated);
        assert_eq!(normalize_page(&stream, vec![created("a"), created("b")]).unwrap().len(), 2);
        let fee = RawEvent::FeeValue(FeeValueRecord {
            distinct_event_id: "f".into(),
            coin_symbol: None,
            value: None,
            timestamp: 1,
            transaction_hash: None,
            service: None,
        });
        assert!(normalize_page(&stream, vec![created("a"), fee]).is_err());
    }
}
