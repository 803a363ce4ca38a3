//! Order parameter preparation and EIP-712 struct hashing.
//!
//! Turns a trader's [`OrderRequest`] into the fixed-point [`OrderParams`]
//! the circuit signs over, binding them with a keccak256 struct hash.

use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolValue;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::types::{OrderKind, OrderParams, OrderRequest};
use crate::{Error, Result};

/// EIP-712 type string for the signed order.
pub const ORDER_TYPE: &str =
    "Order(bytes32 pairIdHash,uint8 side,uint64 priceTick,uint64 amount,uint32 timeBucket,uint64 nonce)";

/// Price ticks per quote unit.
pub const PRICE_SCALE: u64 = 1_000;
/// Base units per whole token.
pub const AMOUNT_SCALE: u64 = 1_000_000;
pub const TIME_BUCKET_MS: i64 = 5 * 60 * 1000;
pub const EPOCH_MS: i64 = 60 * 60 * 1000;
/// Nonces are drawn uniformly from `[0, NONCE_BOUND)`.
pub const NONCE_BOUND: u64 = 1_000_000;

/// `sha256(pair symbol)`, the pair commitment the circuit sees.
pub fn pair_id_hash(pair_id: &str) -> B256 {
    B256::from_slice(&Sha256::digest(pair_id.as_bytes()))
}

/// Five-minute bucket containing `now`.
pub fn time_bucket(now: DateTime<Utc>) -> u64 {
    (now.timestamp_millis().max(0) / TIME_BUCKET_MS) as u64
}

/// One-hour nullifier epoch containing `now`.
pub fn epoch(now: DateTime<Utc>) -> u64 {
    (now.timestamp_millis().max(0) / EPOCH_MS) as u64
}

pub fn random_nonce<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(0..NONCE_BOUND)
}

/// Compute the EIP-712 struct hash over the order fields.
pub fn struct_hash(
    pair_id_hash: B256,
    side: u8,
    price_tick: U256,
    amount: U256,
    time_bucket: U256,
    nonce: U256,
) -> B256 {
    let type_hash = keccak256(ORDER_TYPE.as_bytes());

    // encodeData: every member occupies one 32-byte word.
    let encoded = (
        type_hash,
        pair_id_hash,
        U256::from(side),
        price_tick,
        amount,
        time_bucket,
        nonce,
    )
        .abi_encode_packed();

    keccak256(&encoded)
}

impl OrderParams {
    /// Assemble order params, computing the struct hash.
    pub fn new(
        pair_id_hash: B256,
        side: u8,
        price_tick: U256,
        amount: U256,
        time_bucket: U256,
        nonce: U256,
    ) -> Self {
        Self {
            struct_hash: struct_hash(pair_id_hash, side, price_tick, amount, time_bucket, nonce),
            pair_id_hash,
            side,
            price_tick,
            amount,
            time_bucket,
            nonce,
        }
    }

    /// Scale a trader's request into circuit units.
    ///
    /// `price_tick = floor(price × 1000)` (0 for market orders) and
    /// `amount = floor(amount × 10^6)`.
    pub fn from_request(request: &OrderRequest, now: DateTime<Utc>, nonce: u64) -> Result<Self> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidOrder {
                message: format!("amount must be positive, got {}", request.amount),
            });
        }

        let price_tick = match (request.order_type, request.price) {
            (OrderKind::Market, _) => 0,
            (OrderKind::Limit, Some(price)) if price > Decimal::ZERO => {
                scale("price_tick", price, PRICE_SCALE)?
            }
            (OrderKind::Limit, _) => {
                return Err(Error::InvalidOrder {
                    message: "limit order requires a positive price".to_string(),
                })
            }
        };
        let amount = scale("amount", request.amount, AMOUNT_SCALE)?;

        Ok(Self::new(
            pair_id_hash(&request.pair_id),
            request.side.as_u8(),
            U256::from(price_tick),
            U256::from(amount),
            U256::from(time_bucket(now)),
            U256::from(nonce),
        ))
    }
}

fn scale(field: &'static str, value: Decimal, factor: u64) -> Result<u64> {
    value
        .checked_mul(Decimal::from(factor))
        .map(|scaled| scaled.floor())
        .and_then(|scaled| scaled.to_u64())
        .ok_or_else(|| Error::range(field, value, u64::MAX / factor))
}
