//! Core domain types for zkCLOB order authentication.

pub mod circuit;
pub mod keys;
pub mod order;

pub use circuit::{CircuitArtifacts, CircuitInputs, CircuitOutputs, GrothProof, ProofData};
pub use keys::{TradingKeyInfo, KEY_INFO_MAX_AGE_HOURS, KEY_VERSION};
pub use order::{OrderKind, OrderParams, OrderRequest, OrderSide};
