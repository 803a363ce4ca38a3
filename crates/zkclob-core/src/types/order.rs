//! Order request and circuit-facing order parameter types.

use alloy_primitives::{B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Widest value the circuit accepts for the 64-bit order fields.
pub const MAX_U64_FIELD: u64 = u64::MAX;
/// Widest value the circuit accepts for the time bucket.
pub const MAX_TIME_BUCKET: u64 = u32::MAX as u64;

/// Order side as entered by the trader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Circuit encoding: 1 = buy, 0 = sell.
    pub fn as_u8(&self) -> u8 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => 0,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(Error::InvalidOrder {
                message: format!("unknown side {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
        }
    }
}

impl std::str::FromStr for OrderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderKind::Market),
            "limit" => Ok(OrderKind::Limit),
            other => Err(Error::InvalidOrder {
                message: format!("unknown order type {}", other),
            }),
        }
    }
}

/// What the trader asked for, before any circuit-specific scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Pair symbol, e.g. `HYPE-USDC`.
    pub pair_id: String,
    pub side: OrderSide,
    /// Base amount in whole units.
    pub amount: Decimal,
    /// Limit price. Ignored for market orders.
    pub price: Option<Decimal>,
    pub order_type: OrderKind,
}

impl OrderRequest {
    pub fn market(pair_id: impl Into<String>, side: OrderSide, amount: Decimal) -> Self {
        Self {
            pair_id: pair_id.into(),
            side,
            amount,
            price: None,
            order_type: OrderKind::Market,
        }
    }

    pub fn limit(
        pair_id: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            pair_id: pair_id.into(),
            side,
            amount,
            price: Some(price),
            order_type: OrderKind::Limit,
        }
    }
}

/// Order fields exactly as they are signed and proven.
///
/// Numeric fields are held as [`U256`] so that out-of-range values can be
/// represented and rejected by [`OrderParams::check_ranges`] rather than
/// silently truncated. `pair_id_hash` is the exception: it is a full sha256
/// and always fits the circuit after reduction and truncation to 253 bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParams {
    pub struct_hash: B256,
    pub pair_id_hash: B256,
    pub side: u8,
    pub price_tick: U256,
    pub amount: U256,
    pub time_bucket: U256,
    pub nonce: U256,
}

impl OrderParams {
    /// Reject any field wider than its circuit wire.
    pub fn check_ranges(&self) -> Result<()> {
        if self.side > 1 {
            return Err(Error::range("side", self.side, 1));
        }
        check_field("price_tick", self.price_tick, MAX_U64_FIELD)?;
        check_field("amount", self.amount, MAX_U64_FIELD)?;
        check_field("time_bucket", self.time_bucket, MAX_TIME_BUCKET)?;
        check_field("nonce", self.nonce, MAX_U64_FIELD)?;
        Ok(())
    }
}

fn check_field(field: &'static str, value: U256, max: u64) -> Result<()> {
    if value > U256::from(max) {
        return Err(Error::range(field, value, max));
    }
    Ok(())
}
