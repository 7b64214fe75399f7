//! Stream identity, kinds and planned stream specs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::row::{
    TableSpec, BOTTLE_CREATE, BOTTLE_DESTROY, BOTTLE_LIQUIDATION, BOTTLE_UPDATE, FEE_TOTAL,
    MOLE_FARM_DEPOSIT, MOLE_FARM_WITHDRAW, MOLE_SAVING_DEPOSIT, MOLE_SAVING_WITHDRAW,
    NAVI_DEPOSIT, NAVI_WITHDRAW,
};

// ---------------------------------------------------------------------------
// StreamKey
// ---------------------------------------------------------------------------

/// Identity of one watermark slot: `(protocol, stream name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    protocol: String,
    name: String,
}

impl StreamKey {
    #[must_use]
    pub fn new(protocol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.protocol, self.name)
    }
}

// ---------------------------------------------------------------------------
// StreamKind
// ---------------------------------------------------------------------------

/// Where a stream's events come from, which also fixes how it paginates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// SQL-over-HTTP analytics API, paginated by timestamp watermark.
    Analytics,
    /// Chain event query, paginated by event cursor.
    Chain,
}

/// What one stream instance is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per configured token; keys are prefixed with the symbol.
    Token,
    /// One instance per protocol.
    Protocol,
    /// One instance per tracked liquidity pool.
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    BottleCreated,
    BottleUpdated,
    BottleDestroyed,
    BottleLiquidated,
    FeeTotal,
    NaviDeposit,
    NaviWithdraw,
    MoleSavingDeposit,
    MoleSavingWithdraw,
    MoleFarmDeposit,
    MoleFarmWithdraw,
}

impl StreamKind {
    pub const ALL: [Self; 11] = [
        Self::BottleCreated,
        Self::BottleUpdated,
        Self::BottleDestroyed,
        Self::BottleLiquidated,
        Self::FeeTotal,
        Self::NaviDeposit,
        Self::NaviWithdraw,
        Self::MoleSavingDeposit,
        Self::MoleSavingWithdraw,
        Self::MoleFarmDeposit,
        Self::MoleFarmWithdraw,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottleCreated => "bottle_created",
            Self::BottleUpdated => "bottle_updated",
            Self::BottleDestroyed => "bottle_destroyed",
            Self::BottleLiquidated => "bottle_liquidated",
            Self::FeeTotal => "fee_total",
            Self::NaviDeposit => "navi_deposit",
            Self::NaviWithdraw => "navi_withdraw",
            Self::MoleSavingDeposit => "mole_saving_deposit",
            Self::MoleSavingWithdraw => "mole_saving_withdraw",
            Self::MoleFarmDeposit => "mole_farm_deposit",
            Self::MoleFarmWithdraw => "mole_farm_withdraw",
        }
    }

    #[must_use]
    pub fn origin(self) -> Origin {
        match self {
            Self::BottleCreated
            | Self::BottleUpdated
            | Self::BottleDestroyed
            | Self::BottleLiquidated
            | Self::FeeTotal => Origin::Analytics,
            _ => Origin::Chain,
        }
    }

    #[must_use]
    pub fn scope(self) -> Scope {
        match self {
            Self::BottleCreated
            | Self::BottleUpdated
            | Self::BottleDestroyed
            | Self::BottleLiquidated => Scope::Token,
            Self::MoleFarmDeposit | Self::MoleFarmWithdraw => Scope::Pool,
            _ => Scope::Protocol,
        }
    }

    /// Protocol section the stream's watermark lives under.
    #[must_use]
    pub fn protocol(self) -> &'static str {
        match self.origin() {
            Origin::Analytics => "Bucket",
            Origin::Chain => match self {
                Self::NaviDeposit | Self::NaviWithdraw => "Navi",
                _ => "Mole",
            },
        }
    }

    #[must_use]
    pub fn table(self) -> &'static TableSpec {
        match self {
            Self::BottleCreated => &BOTTLE_CREATE,
            Self::BottleUpdated => &BOTTLE_UPDATE,
            Self::BottleDestroyed => &BOTTLE_DESTROY,
            Self::BottleLiquidated => &BOTTLE_LIQUIDATION,
            Self::FeeTotal => &FEE_TOTAL,
            Self::NaviDeposit => &NAVI_DEPOSIT,
            Self::NaviWithdraw => &NAVI_WITHDRAW,
            Self::MoleSavingDeposit => &MOLE_SAVING_DEPOSIT,
            Self::MoleSavingWithdraw => &MOLE_SAVING_WITHDRAW,
            Self::MoleFarmDeposit => &MOLE_FARM_DEPOSIT,
            Self::MoleFarmWithdraw => &MOLE_FARM_WITHDRAW,
        }
    }

    /// Watermark slot name. `token` applies to token-scoped kinds and
    /// `pool` to pool-scoped ones; both are ignored otherwise.
    #[must_use]
    pub fn stream_name(self, token: Option<&str>, pool: Option<&str>) -> String {
        let token = token.unwrap_or("UNKNOWN");
        match self {
            Self::BottleCreated => format!("{token}_Bottle_Created"),
            Self::BottleUpdated => format!("{token}_Bottle_Updated"),
            Self::BottleDestroyed => format!("{token}_Bottle_Destroyed"),
            Self::BottleLiquidated => format!("{token}_Liquidation"),
            Self::FeeTotal => "Total_Fee_Value_From".to_string(),
            Self::MoleFarmDeposit | Self::MoleFarmWithdraw => {
                let short = pool.map(short_address).unwrap_or_default();
                format!("{}_{short}", self.table().name)
            }
            _ => self.table().name.to_string(),
        }
    }
}

/// First eight hex digits of an address, without the `0x` prefix.
#[must_use]
pub fn short_address(address: &str) -> String {
    address
        .strip_prefix("0x")
        .unwrap_or(address)
        .chars()
        .take(8)
        .collect()
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown stream kind '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// StreamSpec
// ---------------------------------------------------------------------------

/// Token a token-scoped stream is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub symbol: String,
    /// Fully qualified coin type, needed by liquidation queries.
    #[serde(default)]
    pub coin_type: Option<String>,
}

/// A fully planned stream: identity, kind and scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    pub key: StreamKey,
    pub kind: StreamKind,
    pub token: Option<TokenRef>,
    pub pool: Option<String>,
}

impl StreamSpec {
    /// Plan a protocol-scoped stream.
    #[must_use]
    pub fn protocol(kind: StreamKind) -> Self {
        Self {
            key: StreamKey::new(kind.protocol(), kind.stream_name(None, None)),
            kind,
            token: None,
            pool: None,
        }
    }

    /// Plan a token-scoped stream.
    #[must_use]
    pub fn for_token(kind: StreamKind, token: TokenRef) -> Self {
        Self {
            key: StreamKey::new(kind.protocol(), kind.stream_name(Some(&token.symbol), None)),
            kind,
            token: Some(token),
            pool: None,
        }
    }

    /// Plan a pool-scoped stream.
    #[must_use]
    pub fn for_pool(kind: StreamKind, pool: impl Into<String>) -> Self {
        let pool = pool.into();
        Self {
            key: StreamKey::new(kind.protocol(), kind.stream_name(None, Some(&pool))),
            kind,
            token: None,
            pool: Some(pool),
        }
    }

    #[must_use]
    pub fn table(&self) -> &'static TableSpec {
        self.kind.table()
    }

    /// Symbol prefixed onto row keys, for token-scoped streams.
    #[must_use]
    pub fn key_prefix(&self) -> Option<&str> {
        match self.kind.scope() {
            Scope::Token => self.token.as_ref().map(|t| t.symbol.as_str()),
            Scope::Protocol | Scope::Pool => None,
        }
    }
}

impl std::fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.key.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sui() -> TokenRef {
        TokenRef {
            symbol: "SUI".into(),
            coin_type: Some("0x2::sui::SUI".into()),
        }
    }

    #[test]
    fn token_streams_are_named_after_the_symbol() {
        let spec = StreamSpec::for_token(StreamKind::BottleCreated, sui());
        assert_eq!(spec.key, StreamKey::new("Bucket", "SUI_Bottle_Created"));
        assert_eq!(spec.key_prefix(), Some("SUI"));
        assert_eq!(spec.table().name, "Bottle_Create");

        let liq = StreamSpec::for_token(StreamKind::BottleLiquidated, sui());
        assert_eq!(liq.key.name(), "SUI_Liquidation");
    }

    #[test]
    fn protocol_streams_have_no_prefix() {
        let fee = StreamSpec::protocol(StreamKind::FeeTotal);
        assert_eq!(fee.key, StreamKey::new("Bucket", "Total_Fee_Value_From"));
        assert_eq!(fee.key_prefix(), None);

        let navi = StreamSpec::protocol(StreamKind::NaviWithdraw);
        assert_eq!(navi.key, StreamKey::new("Navi", "Navi_Withdraw"));
    }

    #[test]
    fn pool_streams_are_distinguished_by_pool() {
        let a = StreamSpec::for_pool(StreamKind::MoleFarmDeposit, "0x4c50ba9d1e60d229");
        let b = StreamSpec::for_pool(StreamKind::MoleFarmDeposit, "0x59cf0d333464ad29");
        assert_eq!(a.key, StreamKey::new("Mole", "Mole_Farm_Deposit_4c50ba9d"));
        assert_ne!(a.key, b.key);
        assert_eq!(a.table(), b.table());
    }

    #[test]
    fn kind_parses_from_snake_case() {
        for kind in StreamKind::ALL {
            assert_eq!(kind.as_str().parse::<StreamKind>().unwrap(), kind);
        }
        assert!("bottle_exploded".parse::<StreamKind>().is_err());
    }

    #[test]
    fn key_display_joins_protocol_and_name() {
        assert_eq!(StreamKey::new("Navi", "Navi_Deposit").to_string(), "Navi/Navi_Deposit");
    }
}
