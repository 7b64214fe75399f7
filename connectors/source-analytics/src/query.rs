//! SQL text sent to the analytics query API, one shape per stream kind.

use tidemark_types::stream::{StreamKind, StreamSpec};

/// Build the page query for `stream`, starting at `from_ms` (inclusive).
///
/// Returns `None` for streams this source can't serve: chain kinds, token
/// kinds without a token, and liquidations without a coin type.
#[must_use]
pub fn page_query(stream: &StreamSpec, from_ms: Option<i64>) -> Option<String> {
    let token = stream.token.as_ref();
    let mut sql = match stream.kind {
        StreamKind::BottleCreated => format!("SELECT * from {}_Bottle_Created", token?.symbol),
        StreamKind::BottleUpdated => format!("SELECT * from {}_Bottle_Updated", token?.symbol),
        StreamKind::BottleDestroyed => {
            format!("SELECT * from {}_Bottle_Destroyed", token?.symbol)
        }
        StreamKind::BottleLiquidated => format!(
            "SELECT * FROM Liquidations WHERE token_address = '{}'",
            token?.coin_type.as_deref()?.replace('\'', "''")
        ),
        StreamKind::FeeTotal => "SELECT * FROM Total_Fee_Value_From".to_string(),
        StreamKind::NaviDeposit
        | StreamKind::NaviWithdraw
        | StreamKind::MoleSavingDeposit
        | StreamKind::MoleSavingWithdraw
        | StreamKind::MoleFarmDeposit
        | StreamKind::MoleFarmWithdraw => return None,
    };

    if let Some(from_ms) = from_ms {
        let joiner = if sql.contains(" WHERE ") { "AND" } else { "WHERE" };
        sql.push_str(&format!(" {joiner} timestamp >= '{from_ms}'"));
    }
    sql.push_str(" ORDER BY timestamp ASC");
    Some(sql)
}
