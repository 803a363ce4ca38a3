//! EdDSA over BabyJubjub with a Pedersen message hash.
//!
//! Deterministic: the nonce `r` is derived from the private key expansion
//! and the message, so signing the same message twice yields the same
//! signature.

use blake_hash::{Blake512, Digest};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::curve::{pedersen, subgroup_order, Point};
use crate::{Error, Result};

/// Raw private key bytes as produced by key derivation.
pub type PrivateKeyBytes = [u8; 32];

/// Signature `(R8, S)`; `S` is reduced modulo the subgroup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdDSASignature {
    pub r8: Point,
    pub s: BigUint,
}

/// Transport form: `R8` coordinates and `S` as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSignature {
    #[serde(rename = "R8")]
    pub r8: [String; 2],
    #[serde(rename = "S")]
    pub s: String,
}

impl EdDSASignature {
    pub fn encode(&self) -> EncodedSignature {
        EncodedSignature {
            r8: self.r8.to_decimal_strings(),
            s: self.s.to_string(),
        }
    }

    pub fn decode(encoded: &EncodedSignature) -> Result<Self> {
        let s = BigUint::parse_bytes(encoded.s.trim().as_bytes(), 10)
            .ok_or_else(|| Error::encoding(format!("signature S is not decimal: {:?}", encoded.s)))?;
        Ok(Self {
            r8: Point::from_decimal_strings(&encoded.r8)?,
            s,
        })
    }
}

/// BLAKE-512 over `parts`, copied into a wiped buffer.
fn blake512(parts: &[&[u8]]) -> Zeroizing<[u8; 64]> {
    let mut hasher = Blake512::new();
    for part in parts {
        hasher.update(*part);
    }
    let mut digest = hasher.finalize();
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    out
}

/// 64-byte key expansion; the first half becomes the secret scalar, the
/// second half seeds the per-message nonce.
fn expand(private_key: &PrivateKeyBytes) -> Zeroizing<[u8; 64]> {
    blake512(&[&private_key[..]])
}

/// Clamp to a multiple of 8 below 2^255 with bit 254 set.
fn secret_scalar(expanded: &[u8; 64]) -> Zeroizing<BigUint> {
    let mut pruned = Zeroizing::new([0u8; 32]);
    pruned.copy_from_slice(&expanded[..32]);
    pruned[0] &= 0xf8;
    pruned[31] &= 0x7f;
    pruned[31] |= 0x40;
    Zeroizing::new(BigUint::from_bytes_le(&pruned[..]))
}

/// Public key `A = Base8 · (s >> 3)`.
pub fn public_key(private_key: &PrivateKeyBytes) -> Point {
    let s = secret_scalar(&expand(private_key));
    let scalar = Zeroizing::new(&*s >> 3u32);
    Point::base8().mul_scalar(&scalar)
}

fn message_scalar(r8: &Point, public_key: &Point, message: &[u8]) -> Result<BigUint> {
    let mut input = Vec::with_capacity(64 + message.len());
    input.extend_from_slice(&r8.pack());
    input.extend_from_slice(&public_key.pack());
    input.extend_from_slice(message);
    Ok(BigUint::from_bytes_le(&pedersen::hash(&input)?))
}

/// Sign `message` bytes.
pub fn sign(private_key: &PrivateKeyBytes, message: &[u8]) -> Result<EdDSASignature> {
    let expanded = expand(private_key);
    let s = secret_scalar(&expanded);
    let a = Point::base8().mul_scalar(&Zeroizing::new(&*s >> 3u32));
    let order = subgroup_order();

    let nonce_digest = blake512(&[&expanded[32..], message]);
    let r = Zeroizing::new(BigUint::from_bytes_le(&nonce_digest[..]) % order);
    let r8 = Point::base8().mul_scalar(&r);

    let hm = message_scalar(&r8, &a, message).map_err(|e| Error::Signing {
        message: format!("message hash failed: {}", e),
    })?;
    let hs = Zeroizing::new(&hm * &*s);
    let s_sig = (&*r + &*hs) % order;

    Ok(EdDSASignature { r8, s: s_sig })
}

/// Check `Base8 · S == R8 + A · (8 · H(R8, A, message))`.
pub fn verify(public_key: &Point, signature: &EdDSASignature, message: &[u8]) -> bool {
    if signature.s >= *subgroup_order() {
        return false;
    }
    let hm = match message_scalar(&signature.r8, public_key, message) {
        Ok(hm) => hm,
        Err(_) => return false,
    };
    let left = Point::base8().mul_scalar(&signature.s);
    let right = signature.r8 + public_key.mul_scalar(&(hm * 8u32));
    left == right
}
