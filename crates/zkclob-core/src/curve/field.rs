//! Base field of the BabyJubjub curve (the BN254 scalar field).
//!
//! Every conversion here is exact: inputs are either reduced modulo `p`
//! explicitly or rejected, never truncated.

use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::{Error, Result};

pub use ark_bn254::Fr as FieldElement;

/// Field modulus `p`.
pub fn modulus() -> BigUint {
    FieldElement::MODULUS.into()
}

/// Reduce an arbitrary-width integer into the field.
pub fn from_biguint(value: &BigUint) -> FieldElement {
    FieldElement::from(value.clone())
}

/// Little-endian bytes of any length, reduced modulo `p`.
pub fn from_le_bytes_mod_order(bytes: &[u8]) -> FieldElement {
    FieldElement::from_le_bytes_mod_order(bytes)
}

/// Canonical 32-byte little-endian encoding. Values `>= p` are rejected.
pub fn from_canonical_le_bytes(bytes: &[u8]) -> Result<FieldElement> {
    if bytes.len() != 32 {
        return Err(Error::encoding(format!(
            "field element must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let value = BigUint::from_bytes_le(bytes);
    if value >= modulus() {
        return Err(Error::encoding("field element is not below the modulus"));
    }
    Ok(from_biguint(&value))
}

/// Parse a canonical decimal string, as used on the wire for coordinates.
pub fn from_decimal(s: &str) -> Result<FieldElement> {
    let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
        .ok_or_else(|| Error::encoding(format!("not a decimal integer: {:?}", s)))?;
    if value >= modulus() {
        return Err(Error::encoding(format!("{} is not below the field modulus", s)));
    }
    Ok(from_biguint(&value))
}

pub fn to_biguint(fe: &FieldElement) -> BigUint {
    (*fe).into()
}

pub fn to_decimal(fe: &FieldElement) -> String {
    to_biguint(fe).to_string()
}

/// Canonical 32-byte little-endian encoding.
pub fn to_le_bytes(fe: &FieldElement) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&fe.into_bigint().to_bytes_le());
    out
}

/// Big-endian bytes (e.g. a hash) interpreted as an integer and reduced mod `p`.
pub fn reduce_be_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes) % modulus()
}

/// Whether `fe > (p - 1) / 2`; this is the sign bit of a packed point.
pub fn is_negative(fe: &FieldElement) -> bool {
    fe.into_bigint() > FieldElement::MODULUS_MINUS_ONE_DIV_TWO
}

/// Lowest `n` bits of `value`, least significant first.
pub fn to_bits_le(value: &BigUint, n: usize) -> Vec<bool> {
    (0..n as u64).map(|i| value.bit(i)).collect()
}

/// Integer from little-endian bits.
pub fn from_bits_le(bits: &[bool]) -> BigUint {
    let mut value = BigUint::default();
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            value.set_bit(i as u64, true);
        }
    }
    value
}
