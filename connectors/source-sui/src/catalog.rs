//! On-chain identifiers of the tracked protocols.

use tidemark_types::stream::StreamKind;

pub const NAVI_DEPOSIT_EVENT: &str =
    "0xd899cf7d2b5db716bd2cf55599fb0d5ee38a3061e7b6bb6eebf73fa5bc4c81ca::pool::PoolDeposit";
pub const NAVI_WITHDRAW_EVENT: &str =
    "0xd899cf7d2b5db716bd2cf55599fb0d5ee38a3061e7b6bb6eebf73fa5bc4c81ca::pool::PoolWithdraw";

/// BUCK coin type as Navi reports it in `coin_type` (no `0x` prefix).
pub const NAVI_BUCK_COIN_TYPE: &str =
    "ce7ff77a83ea0cb6fd39bd8748e2ec89a3f41e8efdc3f4eb123e0ca37b184db2::buck::BUCK";

/// Navi's BUCK lending pool object.
pub const NAVI_BUCK_POOL: &str =
    "0x98953e1c8af4af0cd8f59a52f9df6e60c9790b8143f556751f10949b40c76c50";

pub const MOLE_SAVING_DEPOSIT_EVENT: &str = "0x5ffa69ee4ee14d899dcc750df92de12bad4bacf81efa1ae12ee76406804dda7f::vault::DepositEvent<0xce7ff77a83ea0cb6fd39bd8748e2ec89a3f41e8efdc3f4eb123e0ca37b184db2::buck::BUCK>";
pub const MOLE_SAVING_WITHDRAW_EVENT: &str = "0x5ffa69ee4ee14d899dcc750df92de12bad4bacf81efa1ae12ee76406804dda7f::vault::WithdrawEvent<0xce7ff77a83ea0cb6fd39bd8748e2ec89a3f41e8efdc3f4eb123e0ca37b184db2::buck::BUCK>";

pub const CETUS_ADD_LIQUIDITY_EVENT: &str =
    "0x1eabed72c53feb3805120a081dc15963c204dc8d091542592abaf7a35689b2fb::pool::AddLiquidityEvent";
pub const CETUS_REMOVE_LIQUIDITY_EVENT: &str =
    "0x1eabed72c53feb3805120a081dc15963c204dc8d091542592abaf7a35689b2fb::pool::RemoveLiquidityEvent";

/// Module emitting the farm worker events.
pub const FARM_WORKER_MODULE: &str = "cetus_clmm_worker";

/// A Mole farm pool and the worker package that emits its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmPool {
    pub address: &'static str,
    pub coin_a: &'static str,
    pub coin_b: &'static str,
    pub package: &'static str,
}

pub const FARM_POOLS: [FarmPool; 2] = [
    FarmPool {
        address: "0x4c50ba9d1e60d229800293a4222851c9c3f797aa5ba8a8d32cc67ec7e79fec60",
        coin_a: "USDC",
        coin_b: "BUCK",
        package: "0x0d661e0f5ae04a6efac1289846171b23edb545b1f0157b71bea2acd22fdeda45",
    },
    FarmPool {
        address: "0x59cf0d333464ad29443d92bfd2ddfd1f794c5830141a5ee4a815d1ef3395bf6c",
        coin_a: "BUCK",
        coin_b: "SUI",
        package: "0xbc54cfd6822831b3687585ab7d5cb03795437c5500caef5e138f6cb7a8f65b78",
    },
];

#[must_use]
pub fn farm_pool(address: &str) -> Option<&'static FarmPool> {
    FARM_POOLS.iter().find(|p| p.address == address)
}

/// Decimal places of an asset symbol.
#[must_use]
pub fn decimals(symbol: &str) -> u32 {
    match symbol {
        "USDC" | "USDT" | "wUSDC" | "wUSDT" => 6,
        "WBTC" | "wBTC" | "BTC" | "ETH" | "wETH" => 8,
        _ => 9,
    }
}

/// Scale an integer base-unit amount to whole units.
#[must_use]
pub fn scale(base_units: u128, symbol: &str) -> f64 {
    base_units as f64 / 10f64.powi(decimals(symbol) as i32)
}

/// Event type a protocol-wide chain stream subscribes to.
#[must_use]
pub fn event_type(kind: StreamKind) -> Option<&'static str> {
    match kind {
        StreamKind::NaviDeposit => Some(NAVI_DEPOSIT_EVENT),
        StreamKind::NaviWithdraw => Some(NAVI_WITHDRAW_EVENT),
        StreamKind::MoleSavingDeposit => Some(MOLE_SAVING_DEPOSIT_EVENT),
        StreamKind::MoleSavingWithdraw => Some(MOLE_SAVING_WITHDRAW_EVENT),
        StreamKind::MoleFarmDeposit => Some(CETUS_ADD_LIQUIDITY_EVENT),
        StreamKind::MoleFarmWithdraw => Some(CETUS_REMOVE_LIQUIDITY_EVENT),
        _ => None,
    }
}
