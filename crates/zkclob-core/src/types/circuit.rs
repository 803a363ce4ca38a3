//! Circuit input, output and proof types.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use super::order::{OrderParams, MAX_TIME_BUCKET, MAX_U64_FIELD};
use crate::curve::field;
use crate::{Error, Result};

/// Inputs to the order-authentication circuit.
///
/// Serializes to the flat JSON object the witness generator reads: scalar
/// signals as decimal strings, bit arrays as `"0"`/`"1"` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitInputs {
    #[serde(rename = "structHash", serialize_with = "field_decimal")]
    pub struct_hash: B256,
    #[serde(serialize_with = "field_decimal")]
    pub pair_id_hash: B256,
    #[serde(serialize_with = "decimal")]
    pub side: u8,
    #[serde(serialize_with = "decimal")]
    pub price_tick: u64,
    #[serde(serialize_with = "decimal")]
    pub amount: u64,
    #[serde(serialize_with = "decimal")]
    pub time_bucket: u32,
    #[serde(serialize_with = "decimal")]
    pub nonce: u64,

    #[serde(rename = "A_bits", serialize_with = "bits_as_strings")]
    pub a_bits: [bool; 256],
    #[serde(rename = "R8_bits", serialize_with = "bits_as_strings")]
    pub r8_bits: [bool; 256],
    #[serde(rename = "S_bits", serialize_with = "bits_as_strings")]
    pub s_bits: [bool; 256],
    #[serde(serialize_with = "decimal")]
    pub epoch: u64,
}

impl CircuitInputs {
    /// Range-check the public order fields and pair them with the private
    /// signature bits.
    pub fn new(
        params: &OrderParams,
        a_bits: [bool; 256],
        r8_bits: [bool; 256],
        s_bits: [bool; 256],
        epoch: u64,
    ) -> Result<Self> {
        params.check_ranges()?;

        Ok(Self {
            struct_hash: params.struct_hash,
            pair_id_hash: params.pair_id_hash,
            side: params.side,
            price_tick: narrow("price_tick", params.price_tick, MAX_U64_FIELD)?,
            amount: narrow("amount", params.amount, MAX_U64_FIELD)?,
            time_bucket: narrow("time_bucket", params.time_bucket, MAX_TIME_BUCKET)?,
            nonce: narrow("nonce", params.nonce, MAX_U64_FIELD)?,
            a_bits,
            r8_bits,
            s_bits,
            epoch,
        })
    }
}

fn narrow<T: TryFrom<U256>>(field: &'static str, value: U256, max: u64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::range(field, value, max))
}

fn field_decimal<S>(value: &B256, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&field::reduce_be_bytes(value.as_slice()).to_string())
}

fn decimal<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(value)
}

fn bits_as_strings<S>(bits: &[bool; 256], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(bits.len()))?;
    for bit in bits {
        seq.serialize_element(if *bit { "1" } else { "0" })?;
    }
    seq.end()
}

/// The three public signals the circuit reveals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitOutputs {
    pub circuit_version: String,
    pub order_hash: String,
    pub nullifier: String,
}

impl CircuitOutputs {
    /// Positional parse: `[circuit_version, order_hash, nullifier, ..]`.
    pub fn from_public_signals(signals: &[String]) -> Result<Self> {
        match signals {
            [version, order_hash, nullifier, ..] => Ok(Self {
                circuit_version: version.clone(),
                order_hash: order_hash.clone(),
                nullifier: nullifier.clone(),
            }),
            _ => Err(Error::OutputParse {
                message: format!("expected at least 3 public signals, got {}", signals.len()),
            }),
        }
    }
}

/// Groth16 proof as produced and consumed by the proving toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrothProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    pub protocol: String,
    pub curve: String,
}

/// Proof plus its public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofData {
    pub proof: GrothProof,
    pub public_signals: Vec<String>,
}

impl ProofData {
    pub fn outputs(&self) -> Result<CircuitOutputs> {
        CircuitOutputs::from_public_signals(&self.public_signals)
    }

    /// Reshape the proof for the on-chain verifier: affine `pi_a`/`pi_c`
    /// and `pi_b` with each Fq2 pair swapped.
    pub fn verifier_calldata(&self) -> Result<GrothProof> {
        let malformed = |what: &str| Error::Encoding {
            message: format!("malformed groth16 proof: {}", what),
        };

        let affine = |coords: &[String], name: &str| -> Result<Vec<String>> {
            coords
                .get(..2)
                .map(|xy| xy.to_vec())
                .ok_or_else(|| malformed(name))
        };

        let mut pi_b = Vec::with_capacity(2);
        for row in self.proof.pi_b.iter().take(2) {
            match row.as_slice() {
                [c0, c1, ..] => pi_b.push(vec![c1.clone(), c0.clone()]),
                _ => return Err(malformed("pi_b")),
            }
        }
        if pi_b.len() != 2 {
            return Err(malformed("pi_b"));
        }

        Ok(GrothProof {
            pi_a: affine(&self.proof.pi_a, "pi_a")?,
            pi_b,
            pi_c: affine(&self.proof.pi_c, "pi_c")?,
            protocol: "groth16".to_string(),
            curve: "bn128".to_string(),
        })
    }
}

/// Compiled circuit, proving key and verification key.
#[derive(Clone, PartialEq)]
pub struct CircuitArtifacts {
    pub wasm: Vec<u8>,
    pub zkey: Vec<u8>,
    pub verification_key: serde_json::Value,
}

impl std::fmt::Debug for CircuitArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitArtifacts")
            .field("wasm_bytes", &self.wasm.len())
            .field("zkey_bytes", &self.zkey.len())
            .finish()
    }
}
