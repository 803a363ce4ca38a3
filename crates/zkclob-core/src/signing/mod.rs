//! Order signing for the zkCLOB circuit.
//!
//! # Architecture
//!
//! ```text
//! OrderRequest
//!       │  order_types::OrderParams::from_request
//!       ▼
//! OrderParams ── struct_hash (EIP-712, keccak256)
//!       │
//!       │  encoding::encode_bytes (478 bits → 60 bytes)
//!       ▼
//! eddsa::sign(private key, message) ──► EdDSASignature (R8, S)
//!       │
//!       │  encoding::signature_to_bits / public_key_to_bits
//!       ▼
//! A_bits, R8_bits, S_bits ──► CircuitInputs
//! ```
//!
//! Private key derivation and scrubbing live in the `auth` crate; this
//! module only ever borrows key bytes.

pub mod eddsa;
pub mod encoding;
pub mod order_types;

pub use eddsa::{EdDSASignature, EncodedSignature, PrivateKeyBytes};
pub use encoding::{
    decode_bits, decode_bytes, encode_bits, encode_bytes, message_bits_for_circuit,
    public_key_to_bits, scalar_to_le_bytes, signature_to_bits, SignatureBits, MESSAGE_BITS,
    MESSAGE_BYTES,
};
pub use order_types::{epoch, pair_id_hash, random_nonce, struct_hash, time_bucket};
