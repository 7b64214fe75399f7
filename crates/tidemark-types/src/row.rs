//! Canonical warehouse rows and their table layouts.
//!
//! Every [`CanonicalRow`] variant maps to exactly one [`TableSpec`]. The
//! order of [`CanonicalRow::values`] is the table's column order, which is
//! what the placeholder builders rely on.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Table layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Float,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Text,
    }
}

const fn float(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Float,
    }
}

const fn timestamp(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Timestamp,
    }
}

/// Static description of a destination table.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TableSpec {
    pub name: &'static str,
    /// Primary key column.
    pub key: &'static str,
    /// Column used for ordering and time windows.
    pub timestamp: &'static str,
    pub columns: &'static [Column],
}

impl TableSpec {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

pub static BOTTLE_CREATE: TableSpec = TableSpec {
    name: "Bottle_Create",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("bottle_id"),
        float("buck_amount"),
        text("coin"),
        float("collateral_amount"),
        text("sender"),
        timestamp("timestamp"),
        text("transaction_hash"),
    ],
};

pub static BOTTLE_UPDATE: TableSpec = TableSpec {
    name: "Bottle_Update",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("bottle_id"),
        float("buck_amount"),
        text("coin"),
        float("collateral_amount"),
        text("sender"),
        timestamp("timestamp"),
        text("transaction_hash"),
        float("buck_change_amount"),
        float("buck_change_amount_usd"),
        float("collateral_change_amount"),
        float("collateral_change_usd"),
    ],
};

pub static BOTTLE_DESTROY: TableSpec = TableSpec {
    name: "Bottle_Destroy",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("bottle_id"),
        text("coin"),
        float("collateral_amount"),
        text("sender"),
        timestamp("timestamp"),
        text("transaction_hash"),
    ],
};

pub static BOTTLE_LIQUIDATION: TableSpec = TableSpec {
    name: "Bottle_Liquidation",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("bottle_id"),
        text("coin"),
        float("collateral_amount"),
        float("collateral_amount_usd"),
        text("liquidator_address"),
        text("pool_address"),
        float("profit_usd"),
        timestamp("timestamp"),
        text("transaction_hash"),
    ],
};

pub static FEE_TOTAL: TableSpec = TableSpec {
    name: "Total_Fee_Value_From",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("coin"),
        float("fee_value"),
        timestamp("timestamp"),
        text("transaction_hash"),
        text("service"),
    ],
};

const ASSET_FLOW_COLUMNS: &[Column] = &[
    text("event_id"),
    timestamp("timestamp"),
    text("sender"),
    text("transaction_hash"),
    text("asset"),
    float("asset_change"),
    float("accumulation"),
];

const PAIR_FLOW_COLUMNS: &[Column] = &[
    text("event_id"),
    text("pool"),
    timestamp("timestamp"),
    text("sender"),
    text("transaction_hash"),
    float("accumulation_a"),
    float("accumulation_b"),
    text("asset_a"),
    text("asset_b"),
    float("asset_change_a"),
    float("asset_change_b"),
];

pub static NAVI_DEPOSIT: TableSpec = TableSpec {
    name: "Navi_Deposit",
    key: "event_id",
    timestamp: "timestamp",
    columns: ASSET_FLOW_COLUMNS,
};

pub static NAVI_WITHDRAW: TableSpec = TableSpec {
    name: "Navi_Withdraw",
    key: "event_id",
    timestamp: "timestamp",
    columns: ASSET_FLOW_COLUMNS,
};

pub static MOLE_SAVING_DEPOSIT: TableSpec = TableSpec {
    name: "Mole_Saving_Deposit",
    key: "event_id",
    timestamp: "timestamp",
    columns: ASSET_FLOW_COLUMNS,
};

pub static MOLE_SAVING_WITHDRAW: TableSpec = TableSpec {
    name: "Mole_Saving_Withdraw",
    key: "event_id",
    timestamp: "timestamp",
    columns: ASSET_FLOW_COLUMNS,
};

pub static MOLE_FARM_DEPOSIT: TableSpec = TableSpec {
    name: "Mole_Farm_Deposit",
    key: "event_id",
    timestamp: "timestamp",
    columns: PAIR_FLOW_COLUMNS,
};

pub static MOLE_FARM_WITHDRAW: TableSpec = TableSpec {
    name: "Mole_Farm_Withdraw",
    key: "event_id",
    timestamp: "timestamp",
    columns: PAIR_FLOW_COLUMNS,
};

pub static NAVI_POOL: TableSpec = TableSpec {
    name: "Navi_Pool",
    key: "id",
    timestamp: "timestamp",
    columns: &[
        text("id"),
        text("pool"),
        text("asset"),
        float("balance"),
        timestamp("timestamp"),
    ],
};

/// Every table the pipeline can write to.
pub static ALL_TABLES: [&TableSpec; 12] = [
    &BOTTLE_CREATE,
    &BOTTLE_UPDATE,
    &BOTTLE_DESTROY,
    &BOTTLE_LIQUIDATION,
    &FEE_TOTAL,
    &NAVI_DEPOSIT,
    &NAVI_WITHDRAW,
    &MOLE_SAVING_DEPOSIT,
    &MOLE_SAVING_WITHDRAW,
    &MOLE_FARM_DEPOSIT,
    &MOLE_FARM_WITHDRAW,
    &NAVI_POOL,
];

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single bound parameter, typed by its column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Float(Option<f64>),
    /// Epoch milliseconds, UTC.
    Timestamp(i64),
}

impl SqlValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => *v,
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp_ms(&self) -> Option<i64> {
        match self {
            Self::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleCreate {
    pub id: String,
    pub bottle_id: Option<String>,
    pub buck_amount: Option<f64>,
    pub coin: Option<String>,
    pub collateral_amount: Option<f64>,
    pub sender: Option<String>,
    pub timestamp_ms: i64,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleUpdate {
    pub id: String,
    pub bottle_id: Option<String>,
    pub buck_amount: Option<f64>,
    pub coin: Option<String>,
    pub collateral_amount: Option<f64>,
    pub sender: Option<String>,
    pub timestamp_ms: i64,
    pub transaction_hash: Option<String>,
    pub buck_change_amount: Option<f64>,
    pub buck_change_amount_usd: Option<f64>,
    pub collateral_change_amount: Option<f64>,
    pub collateral_change_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleDestroy {
    pub id: String,
    pub bottle_id: Option<String>,
    pub coin: Option<String>,
    pub collateral_amount: Option<f64>,
    pub sender: Option<String>,
    pub timestamp_ms: i64,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidation {
    pub id: String,
    pub bottle_id: Option<String>,
    pub coin: Option<String>,
    pub collateral_amount: Option<f64>,
    pub collateral_amount_usd: Option<f64>,
    pub liquidator_address: Option<String>,
    pub pool_address: Option<String>,
    pub profit_usd: Option<f64>,
    pub timestamp_ms: i64,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTotal {
    pub id: String,
    pub coin: Option<String>,
    pub fee_value: Option<f64>,
    pub timestamp_ms: i64,
    pub transaction_hash: Option<String>,
    pub service: Option<String>,
}

/// Single-asset deposit or withdraw with a running total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFlow {
    pub event_id: String,
    pub timestamp_ms: i64,
    pub sender: String,
    pub transaction_hash: String,
    pub asset: String,
    pub asset_change: f64,
    pub accumulation: f64,
}

/// Two-asset liquidity movement on one pool with running totals per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFlow {
    pub event_id: String,
    pub pool: String,
    pub timestamp_ms: i64,
    pub sender: String,
    pub transaction_hash: String,
    pub accumulation_a: f64,
    pub accumulation_b: f64,
    pub asset_a: String,
    pub asset_b: String,
    pub asset_change_a: f64,
    pub asset_change_b: f64,
}

/// Point-in-time balance of a lending pool object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: String,
    pub pool: String,
    pub asset: String,
    pub balance: f64,
    pub timestamp_ms: i64,
}

impl PoolSnapshot {
    #[must_use]
    pub fn new(pool: impl Into<String>, asset: impl Into<String>, balance: f64, timestamp_ms: i64) -> Self {
        let pool = pool.into();
        Self {
            id: format!("{pool}-{timestamp_ms}"),
            pool,
            asset: asset.into(),
            balance,
            timestamp_ms,
        }
    }
}

/// Normalized record ready for the warehouse. Rows are immutable once
/// inserted; Update and Destroy are event kinds of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRow {
    BottleCreate(BottleCreate),
    BottleUpdate(BottleUpdate),
    BottleDestroy(BottleDestroy),
    Liquidation(Liquidation),
    FeeTotal(FeeTotal),
    AssetFlow(AssetFlow),
    PairFlow(PairFlow),
    PoolSnapshot(PoolSnapshot),
}

impl CanonicalRow {
    /// Primary key value.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::BottleCreate(r) => &r.id,
            Self::BottleUpdate(r) => &r.id,
            Self::BottleDestroy(r) => &r.id,
            Self::Liquidation(r) => &r.id,
            Self::FeeTotal(r) => &r.id,
            Self::AssetFlow(r) => &r.event_id,
            Self::PairFlow(r) => &r.event_id,
            Self::PoolSnapshot(r) => &r.id,
        }
    }

    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::BottleCreate(r) => r.timestamp_ms,
            Self::BottleUpdate(r) => r.timestamp_ms,
            Self::BottleDestroy(r) => r.timestamp_ms,
            Self::Liquidation(r) => r.timestamp_ms,
            Self::FeeTotal(r) => r.timestamp_ms,
            Self::AssetFlow(r) => r.timestamp_ms,
            Self::PairFlow(r) => r.timestamp_ms,
            Self::PoolSnapshot(r) => r.timestamp_ms,
        }
    }

    /// Column values in the order of the row's table layout.
    #[must_use]
    pub fn values(&self) -> Vec<SqlValue> {
        use SqlValue::{Float, Text, Timestamp};

        fn t(v: &Option<String>) -> SqlValue {
            SqlValue::Text(v.clone())
        }
        fn s(v: &str) -> SqlValue {
            SqlValue::Text(Some(v.to_string()))
        }

        match self {
            Self::BottleCreate(r) => vec![
                s(&r.id),
                t(&r.bottle_id),
                Float(r.buck_amount),
                t(&r.coin),
                Float(r.collateral_amount),
                t(&r.sender),
                Timestamp(r.timestamp_ms),
                t(&r.transaction_hash),
            ],
            Self::BottleUpdate(r) => vec![
                s(&r.id),
                t(&r.bottle_id),
                Float(r.buck_amount),
                t(&r.coin),
                Float(r.collateral_amount),
                t(&r.sender),
                Timestamp(r.timestamp_ms),
                t(&r.transaction_hash),
                Float(r.buck_change_amount),
                Float(r.buck_change_amount_usd),
                Float(r.collateral_change_amount),
                Float(r.collateral_change_usd),
            ],
            Self::BottleDestroy(r) => vec![
                s(&r.id),
                t(&r.bottle_id),
                t(&r.coin),
                Float(r.collateral_amount),
                t(&r.sender),
                Timestamp(r.timestamp_ms),
                t(&r.transaction_hash),
            ],
            Self::Liquidation(r) => vec![
                s(&r.id),
                t(&r.bottle_id),
                t(&r.coin),
                Float(r.collateral_amount),
                Float(r.collateral_amount_usd),
                t(&r.liquidator_address),
                t(&r.pool_address),
                Float(r.profit_usd),
                Timestamp(r.timestamp_ms),
                t(&r.transaction_hash),
            ],
            Self::FeeTotal(r) => vec![
                s(&r.id),
                t(&r.coin),
                Float(r.fee_value),
                Timestamp(r.timestamp_ms),
                t(&r.transaction_hash),
                t(&r.service),
            ],
            Self::AssetFlow(r) => vec![
                s(&r.event_id),
                Timestamp(r.timestamp_ms),
                s(&r.sender),
                s(&r.transaction_hash),
                s(&r.asset),
                Float(Some(r.asset_change)),
                Float(Some(r.accumulation)),
            ],
            Self::PairFlow(r) => vec![
                s(&r.event_id),
                s(&r.pool),
                Timestamp(r.timestamp_ms),
                s(&r.sender),
                s(&r.transaction_hash),
                Float(Some(r.accumulation_a)),
                Float(Some(r.accumulation_b)),
                s(&r.asset_a),
                s(&r.asset_b),
                Float(Some(r.asset_change_a)),
                Float(Some(r.asset_change_b)),
            ],
            Self::PoolSnapshot(r) => vec![
                s(&r.id),
                s(&r.pool),
                s(&r.asset),
                Float(Some(r.balance)),
                Timestamp(r.timestamp_ms),
            ],
        }
    }
}
