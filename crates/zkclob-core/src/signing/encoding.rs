//! Bit-exact order message and signature encodings for the circuit.
//!
//! The signed message is the concatenation of each order field, first
//! reduced into the BabyJubjub base field and then decomposed little-endian
//! into its fixed width:
//!
//! ```text
//! | pair_id_hash | side | price_tick | amount | time_bucket | nonce |
//! |   253 bits   |  1   |     64     |   64   |     32      |  64   |  = 478 bits
//! ```
//!
//! Bits are packed LSB-first into 60 bytes, the final byte zero-padded.
//!
//! The pair hash is a full 256-bit digest. After reduction it can still be
//! as wide as the field (254 bits), and only its low 253 bits are signed.
//! Decoding therefore returns the truncated hash whenever the reduced value
//! is at least 2^253; the circuit sees the same truncated bits.

use alloy_primitives::{B256, U256};
use num_bigint::BigUint;

use super::eddsa::EdDSASignature;
use crate::curve::field::{self, FieldElement};
use crate::curve::Point;
use crate::types::OrderParams;
use crate::{Error, Result};

pub const PAIR_ID_BITS: usize = 253;
pub const SIDE_BITS: usize = 1;
pub const PRICE_TICK_BITS: usize = 64;
pub const AMOUNT_BITS: usize = 64;
pub const TIME_BUCKET_BITS: usize = 32;
pub const NONCE_BITS: usize = 64;

pub const MESSAGE_BITS: usize =
    PAIR_ID_BITS + SIDE_BITS + PRICE_TICK_BITS + AMOUNT_BITS + TIME_BUCKET_BITS + NONCE_BITS;
pub const MESSAGE_BYTES: usize = MESSAGE_BITS.div_ceil(8);

fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_le(&value.to_le_bytes::<32>())
}

/// Reduce into the field, then take the low `width` bits.
fn field_bits(value: &BigUint, width: usize) -> Vec<bool> {
    let reduced = field::to_biguint(&field::from_biguint(value));
    field::to_bits_le(&reduced, width)
}

/// Encode order params into the 478-bit circuit message.
///
/// The pair hash is reduced and truncated to [`PAIR_ID_BITS`] rather than
/// range-checked.
pub fn encode_bits(params: &OrderParams) -> Result<Vec<bool>> {
    params.check_ranges()?;

    let pair_id = BigUint::from_bytes_be(params.pair_id_hash.as_slice());
    let mut bits = Vec::with_capacity(MESSAGE_BITS);
    bits.extend(field_bits(&pair_id, PAIR_ID_BITS));
    bits.extend(field_bits(&BigUint::from(params.side), SIDE_BITS));
    bits.extend(field_bits(&u256_to_biguint(params.price_tick), PRICE_TICK_BITS));
    bits.extend(field_bits(&u256_to_biguint(params.amount), AMOUNT_BITS));
    bits.extend(field_bits(&u256_to_biguint(params.time_bucket), TIME_BUCKET_BITS));
    bits.extend(field_bits(&u256_to_biguint(params.nonce), NONCE_BITS));
    Ok(bits)
}

/// Encode order params into the 60-byte message that gets signed.
pub fn encode_bytes(params: &OrderParams) -> Result<[u8; MESSAGE_BYTES]> {
    let packed = pack_bits_le(&encode_bits(params)?);
    let mut out = [0u8; MESSAGE_BYTES];
    out.copy_from_slice(&packed);
    Ok(out)
}

/// Re-assemble order params from a message bit string.
///
/// Accepts the 478 message bits optionally followed by zero padding. The
/// struct hash is recomputed from the decoded fields.
pub fn decode_bits(bits: &[bool]) -> Result<OrderParams> {
    if bits.len() < MESSAGE_BITS {
        return Err(Error::encoding(format!(
            "message has {} bits, expected {}",
            bits.len(),
            MESSAGE_BITS
        )));
    }
    if bits[MESSAGE_BITS..].iter().any(|b| *b) {
        return Err(Error::encoding("non-zero padding after order message"));
    }

    let mut offset = 0;
    let mut take = |width: usize| {
        let value = field::from_bits_le(&bits[offset..offset + width]);
        offset += width;
        value
    };

    let pair_id = take(PAIR_ID_BITS);
    let side = take(SIDE_BITS);
    let price_tick = take(PRICE_TICK_BITS);
    let amount = take(AMOUNT_BITS);
    let time_bucket = take(TIME_BUCKET_BITS);
    let nonce = take(NONCE_BITS);

    let to_u256 = |v: BigUint| U256::from_le_slice(&v.to_bytes_le());

    Ok(OrderParams::new(
        B256::left_padding_from(&pair_id.to_bytes_be()),
        if side.bit(0) { 1 } else { 0 },
        to_u256(price_tick),
        to_u256(amount),
        to_u256(time_bucket),
        to_u256(nonce),
    ))
}

pub fn decode_bytes(bytes: &[u8]) -> Result<OrderParams> {
    decode_bits(&bytes_to_bits_le(bytes))
}

/// Byte-aligned message bits, as the circuit re-expands the signed bytes.
pub fn message_bits_for_circuit(params: &OrderParams) -> Result<Vec<bool>> {
    Ok(bytes_to_bits_le(&encode_bytes(params)?))
}

pub fn pack_bits_le(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

pub fn bytes_to_bits_le(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |j| (byte >> j) & 1 == 1))
        .collect()
}

fn bit_array(bytes: &[u8; 32]) -> [bool; 256] {
    let mut bits = [false; 256];
    for (i, bit) in bytes_to_bits_le(bytes).into_iter().enumerate() {
        bits[i] = bit;
    }
    bits
}

/// Integer to exactly 32 little-endian bytes by repeated mask-and-shift.
///
/// Used for the signature scalar `S`, which lives modulo the subgroup order
/// and must not go through the base-field encoder.
pub fn scalar_to_le_bytes(scalar: &BigUint) -> Result<[u8; 32]> {
    if scalar.bits() > 256 {
        return Err(Error::encoding(format!(
            "scalar needs {} bits, at most 256 fit",
            scalar.bits()
        )));
    }
    let mask = BigUint::from(0xffu32);
    let mut rest = scalar.clone();
    let mut out = [0u8; 32];
    for byte in out.iter_mut() {
        let low = &rest & &mask;
        *byte = low.to_u32_digits().first().copied().unwrap_or(0) as u8;
        rest >>= 8u32;
    }
    Ok(out)
}

/// Packed public key expanded to 256 little-endian bits (`A_bits`).
pub fn public_key_to_bits(public_key: &Point) -> [bool; 256] {
    bit_array(&public_key.pack())
}

/// Circuit bit arrays for a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBits {
    pub r8_bits: [bool; 256],
    pub s_bits: [bool; 256],
    /// `S` as a base-field element, reduced modulo `p` when `S >= p`.
    pub s_field: FieldElement,
    /// Set when the reduction above had to be applied.
    pub s_reduced: bool,
}

/// Convert `(R8, S)` to the circuit's bit arrays.
///
/// `S_bits` always come from the unreduced integer value of `S`.
pub fn signature_to_bits(signature: &EdDSASignature) -> Result<SignatureBits> {
    let r8_bits = bit_array(&signature.r8.pack());

    let s_reduced = signature.s >= field::modulus();
    let s_field = if s_reduced {
        tracing::warn!("signature scalar exceeds the base field, reducing");
        field::from_biguint(&(&signature.s % field::modulus()))
    } else {
        field::from_biguint(&signature.s)
    };

    let s_bits = bit_array(&scalar_to_le_bytes(&signature.s)?);

    Ok(SignatureBits {
        r8_bits,
        s_bits,
        s_field,
        s_reduced,
    })
}
